//! Job Store: the single source of truth for job lifecycle state.
//!
//! [`JobStore`] is the seam between the HTTP surface, the runner, and
//! the retention sweep. Two backends implement it: [`MemoryJobStore`]
//! (process-lifetime table, the default) and [`PgJobStore`] (sqlx /
//! PostgreSQL, for deployments that must survive restarts). All
//! mutation goes through `create` / `transition` / `delete`; the
//! transition guard is what makes concurrent runner/cancel races safe.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use autodash_core::{CoreError, Job, JobId, PipelineKind, Timestamp, Transition};

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

/// Durable (at least process-lifetime) mapping from job id to job record.
///
/// Implementations must make each operation atomic per job id: a reader
/// never observes a partially applied transition, and of two racing
/// transitions only one commits (the loser gets `InvalidTransition`).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Allocate a new id and insert a QUEUED record.
    ///
    /// Fails only with `Capacity` when the store is tracking its
    /// configured maximum number of jobs.
    async fn create(
        &self,
        kind: PipelineKind,
        input_refs: Vec<String>,
    ) -> Result<Job, CoreError>;

    /// Current snapshot of a job. `NotFound` for unknown or expired ids.
    async fn get(&self, id: JobId) -> Result<Job, CoreError>;

    /// Apply a single forward transition and return the updated record.
    ///
    /// `InvalidTransition` when the edge violates the lifecycle order,
    /// `NotFound` when the id is unknown.
    async fn transition(&self, id: JobId, transition: &Transition) -> Result<Job, CoreError>;

    /// Remove a record. Idempotent: deleting an absent id is a no-op.
    async fn delete(&self, id: JobId) -> Result<(), CoreError>;

    /// Page of jobs, newest first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Job>, CoreError>;

    /// Terminal jobs whose `updated_at` is older than `cutoff`.
    /// Non-terminal jobs are never returned.
    async fn list_expired(&self, cutoff: Timestamp) -> Result<Vec<Job>, CoreError>;

    /// Number of tracked jobs (any state).
    async fn count(&self) -> Result<usize, CoreError>;
}
