//! Image masking via a ComfyUI node graph.
//!
//! The graph template (its node layout, models, and parameters) is an
//! external artifact loaded at startup; this variant only injects the
//! submission's image into it and runs it.

use async_trait::async_trait;

use crate::comfy::{inject_inputs, ComfyClient};
use crate::{ArtifactPayload, Pipeline, PipelineError};

pub struct MaskPipeline {
    comfy: ComfyClient,
    graph_template: serde_json::Value,
}

impl MaskPipeline {
    pub fn new(comfy: ComfyClient, graph_template: serde_json::Value) -> Self {
        Self {
            comfy,
            graph_template,
        }
    }
}

#[async_trait]
impl Pipeline for MaskPipeline {
    async fn execute(&self, input_refs: &[String]) -> Result<ArtifactPayload, PipelineError> {
        let graph = inject_inputs(&self.graph_template, input_refs)?;
        self.comfy.run_graph(&graph).await
    }
}
