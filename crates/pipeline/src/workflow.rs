//! Background-change workflow via a ComfyUI node graph.
//!
//! Same protocol as masking, different template: the workflow graph
//! takes the source image plus its mask (two LoadImage nodes), so a
//! submission carries both references.

use async_trait::async_trait;

use crate::comfy::{inject_inputs, ComfyClient};
use crate::{ArtifactPayload, Pipeline, PipelineError};

pub struct WorkflowPipeline {
    comfy: ComfyClient,
    graph_template: serde_json::Value,
}

impl WorkflowPipeline {
    pub fn new(comfy: ComfyClient, graph_template: serde_json::Value) -> Self {
        Self {
            comfy,
            graph_template,
        }
    }
}

#[async_trait]
impl Pipeline for WorkflowPipeline {
    async fn execute(&self, input_refs: &[String]) -> Result<ArtifactPayload, PipelineError> {
        let graph = inject_inputs(&self.graph_template, input_refs)?;
        self.comfy.run_graph(&graph).await
    }
}
