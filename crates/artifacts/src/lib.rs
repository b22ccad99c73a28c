//! Artifact storage: where pipeline outputs live between completion and
//! cleanup.
//!
//! The runner writes an artifact exactly once, before it commits the
//! COMPLETED transition; after that the bytes are immutable until the
//! retention sweep deletes them. [`ArtifactStore`] is the seam where an
//! object store would plug in; [`FsArtifactStore`] is the filesystem
//! backend the service ships with.

pub mod fs;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub use fs::FsArtifactStore;

/// Opaque reference to a stored artifact. Produced by `put`, consumed
/// by `get`/`delete`, recorded on the job.
pub type ArtifactRef = String;

/// Readable byte stream for a stored artifact.
pub type ArtifactReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// The reference is malformed (absolute, traversing, or empty).
    #[error("Invalid artifact reference '{0}'")]
    InvalidRef(String),

    /// No artifact is stored under the reference.
    #[error("Artifact '{0}' not found")]
    NotFound(String),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write-once blob storage for job outputs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `key` and return the reference for it.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<ArtifactRef, ArtifactError>;

    /// Open a stored artifact for streaming. Also returns its size so
    /// HTTP responses can set `Content-Length`.
    async fn get(&self, artifact_ref: &str) -> Result<(u64, ArtifactReader), ArtifactError>;

    /// Delete a stored artifact. Idempotent: deleting an absent
    /// reference is a no-op.
    async fn delete(&self, artifact_ref: &str) -> Result<(), ArtifactError>;
}
