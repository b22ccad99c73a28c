use std::sync::Arc;

use autodash_artifacts::ArtifactStore;
use autodash_store::JobStore;

use crate::config::ServerConfig;
use crate::engine::JobRunner;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The job store: single source of truth for job lifecycle state.
    pub store: Arc<dyn JobStore>,
    /// Artifact storage backend.
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Handle for dispatching submitted jobs onto the worker pool.
    pub runner: Arc<JobRunner>,
}
