//! Face-based renaming, delegated to an external detection service.
//!
//! The face model itself is not part of this process; we post the
//! staged image references and keep the service's rename map as the
//! job artifact.

use async_trait::async_trait;

use crate::{ArtifactPayload, Pipeline, PipelineError};

pub struct RenamePipeline {
    client: reqwest::Client,
    base_url: String,
}

impl RenamePipeline {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Pipeline for RenamePipeline {
    async fn execute(&self, input_refs: &[String]) -> Result<ArtifactPayload, PipelineError> {
        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .json(&serde_json::json!({ "images": input_refs }))
            .send()
            .await?;
        let response = crate::ensure_success(response).await?;

        Ok(ArtifactPayload {
            file_name: "rename_map.json".to_string(),
            bytes: response.bytes().await?.to_vec(),
        })
    }
}
