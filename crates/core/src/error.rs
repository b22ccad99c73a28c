use crate::job::{Failure, JobState};
use crate::types::JobId;

/// Domain error taxonomy shared by the store, runner, and HTTP layer.
///
/// The first group are caller errors; `InvalidTransition`,
/// `AlreadyRunning`, and `AlreadyTerminal` are internal consistency
/// guards that indicate a logic bug when they surface.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Job {id} not found")]
    NotFound { id: JobId },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The job exists but has not produced an artifact yet. Transient;
    /// the caller should poll again.
    #[error("Job {id} has no result yet (state: {state})")]
    NotReady { id: JobId, state: JobState },

    /// The job reached FAILED; carries the stored failure verbatim.
    #[error("Job {id} failed: {failure}")]
    Failed { id: JobId, failure: Failure },

    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("Job {id} is already running")]
    AlreadyRunning { id: JobId },

    #[error("Job {id} is already terminal (state: {state})")]
    AlreadyTerminal { id: JobId, state: JobState },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The job store refused a `create` because it is tracking the
    /// configured maximum number of jobs. Callers should retry later.
    #[error("Job store at capacity ({limit} tracked jobs)")]
    Capacity { limit: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
