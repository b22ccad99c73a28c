//! Pipeline variants: the four automation backends behind one trait.
//!
//! A [`Pipeline`] is an opaque, possibly slow, possibly failing
//! transformation from staged input references to one output artifact.
//! The runner neither knows nor cares which variant it is executing;
//! [`PipelineSet`] is the registry that maps a submission's kind to its
//! implementation.
//!
//! `mask` and `workflow` drive a ComfyUI instance through its HTTP API
//! (`comfy` module); `rename` and `promptmap` delegate to external
//! services over plain HTTP posts.

pub mod comfy;
pub mod mask;
pub mod promptmap;
pub mod rename;
pub mod workflow;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use autodash_core::PipelineKind;

pub use comfy::ComfyClient;
pub use mask::MaskPipeline;
pub use promptmap::PromptmapPipeline;
pub use rename::RenamePipeline;
pub use workflow::WorkflowPipeline;

/// Errors from a pipeline upstream.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Upstream request failed: {0}")]
    Request(String),

    /// The upstream returned a non-2xx status code.
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The upstream answered 2xx but the payload made no sense.
    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Request(e.to_string())
    }
}

/// The output of a successful pipeline run, not yet persisted. The
/// runner writes it to artifact storage before committing COMPLETED.
#[derive(Debug, Clone)]
pub struct ArtifactPayload {
    /// File name the artifact should be served under.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One job-type-specific transformation.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Run the transformation for one job. Slow calls are fine; the
    /// runner enforces the deadline and isolates failures.
    async fn execute(&self, input_refs: &[String]) -> Result<ArtifactPayload, PipelineError>;
}

/// Registry mapping each mounted [`PipelineKind`] to its implementation.
#[derive(Default, Clone)]
pub struct PipelineSet {
    pipelines: HashMap<PipelineKind, Arc<dyn Pipeline>>,
}

impl PipelineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(mut self, kind: PipelineKind, pipeline: Arc<dyn Pipeline>) -> Self {
        self.pipelines.insert(kind, pipeline);
        self
    }

    pub fn get(&self, kind: PipelineKind) -> Option<Arc<dyn Pipeline>> {
        self.pipelines.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<PipelineKind> {
        let mut kinds: Vec<PipelineKind> = self.pipelines.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

/// Check a response status, turning non-2xx answers into
/// [`PipelineError::Upstream`] with the raw body kept for debugging.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Upstream {
        status: status.as_u16(),
        body,
    })
}
