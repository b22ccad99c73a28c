//! Prompt generation, delegated to an external language-model service.
//!
//! The model call (and its prompt library) lives behind the upstream;
//! the generated prompt map JSON becomes the job artifact, in the shape
//! the workflow pipeline consumes downstream.

use async_trait::async_trait;

use crate::{ArtifactPayload, Pipeline, PipelineError};

pub struct PromptmapPipeline {
    client: reqwest::Client,
    base_url: String,
}

impl PromptmapPipeline {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Pipeline for PromptmapPipeline {
    async fn execute(&self, input_refs: &[String]) -> Result<ArtifactPayload, PipelineError> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&serde_json::json!({ "images": input_refs }))
            .send()
            .await?;
        let response = crate::ensure_success(response).await?;

        Ok(ArtifactPayload {
            file_name: "prompts.json".to_string(),
            bytes: response.bytes().await?.to_vec(),
        })
    }
}
