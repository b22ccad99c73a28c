//! HTTP client for a ComfyUI instance.
//!
//! Speaks the three endpoints the mask and workflow pipelines need:
//! `POST /prompt` to queue a node graph, `GET /history/{prompt_id}` to
//! poll for completion, and `GET /view` to fetch an output image.

use std::time::Duration;

use serde::Deserialize;

use crate::{ArtifactPayload, PipelineError};

/// Default delay between history polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct ComfyClient {
    client: reqwest::Client,
    api_url: String,
    /// Client id sent with every queued prompt so ComfyUI can correlate
    /// executions back to this process.
    client_id: String,
    poll_interval: Duration,
}

/// Response from `POST /prompt` after a graph is queued.
#[derive(Debug, Deserialize)]
struct QueueResponse {
    prompt_id: String,
}

/// One entry of an output node's `images` array.
#[derive(Debug, Deserialize)]
struct OutputImage {
    filename: String,
    #[serde(default)]
    subfolder: String,
    #[serde(rename = "type", default)]
    folder_type: String,
}

impl ComfyClient {
    /// * `api_url` - base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Queue a node graph for execution, returning the server-assigned
    /// prompt id.
    pub async fn queue_graph(&self, graph: &serde_json::Value) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "prompt": graph,
            "client_id": self.client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;
        let response = crate::ensure_success(response).await?;

        let queued: QueueResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Malformed(format!("queue response: {e}")))?;
        Ok(queued.prompt_id)
    }

    /// Fetch the outputs object for a prompt, or `None` while it is
    /// still executing.
    async fn outputs(&self, prompt_id: &str) -> Result<Option<serde_json::Value>, PipelineError> {
        let response = self
            .client
            .get(format!("{}/history/{prompt_id}", self.api_url))
            .send()
            .await?;
        let response = crate::ensure_success(response).await?;

        let history: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Malformed(format!("history response: {e}")))?;
        Ok(history
            .get(prompt_id)
            .and_then(|entry| entry.get("outputs"))
            .cloned())
    }

    /// Download one output image via `GET /view`.
    async fn fetch_image(&self, image: &OutputImage) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.folder_type.as_str()),
            ])
            .send()
            .await?;
        let response = crate::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Queue a graph, poll until it finishes, and fetch the first
    /// output image. The polling loop is unbounded; the runner's
    /// per-job deadline is what terminates a wedged execution.
    pub async fn run_graph(
        &self,
        graph: &serde_json::Value,
    ) -> Result<ArtifactPayload, PipelineError> {
        let prompt_id = self.queue_graph(graph).await?;
        tracing::debug!(prompt_id = %prompt_id, "Graph queued on ComfyUI");

        loop {
            if let Some(outputs) = self.outputs(&prompt_id).await? {
                let image = first_output_image(&outputs)?;
                let bytes = self.fetch_image(&image).await?;
                tracing::debug!(
                    prompt_id = %prompt_id,
                    file_name = %image.filename,
                    size = bytes.len(),
                    "Fetched ComfyUI output image",
                );
                return Ok(ArtifactPayload {
                    file_name: image.filename,
                    bytes,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Pick the first output node that produced images.
fn first_output_image(outputs: &serde_json::Value) -> Result<OutputImage, PipelineError> {
    let nodes = outputs
        .as_object()
        .ok_or_else(|| PipelineError::Malformed("outputs is not an object".to_string()))?;

    for node in nodes.values() {
        if let Some(images) = node.get("images").and_then(|v| v.as_array()) {
            if let Some(first) = images.first() {
                return serde_json::from_value(first.clone())
                    .map_err(|e| PipelineError::Malformed(format!("output image entry: {e}")));
            }
        }
    }

    Err(PipelineError::Malformed(
        "no output images in execution history".to_string(),
    ))
}

/// Inject staged input references into a graph template.
///
/// LoadImage nodes are assigned in node-id order. A template may carry
/// more LoadImage nodes than the submission has references (the extras
/// keep their template defaults), but not the reverse.
pub fn inject_inputs(
    template: &serde_json::Value,
    input_refs: &[String],
) -> Result<serde_json::Value, PipelineError> {
    let mut graph = template.clone();
    let nodes = graph
        .as_object_mut()
        .ok_or_else(|| PipelineError::Malformed("graph template is not an object".to_string()))?;

    let mut load_nodes: Vec<String> = nodes
        .iter()
        .filter(|(_, node)| node.get("class_type").and_then(|v| v.as_str()) == Some("LoadImage"))
        .map(|(id, _)| id.clone())
        .collect();
    load_nodes.sort();

    if load_nodes.len() < input_refs.len() {
        return Err(PipelineError::Malformed(format!(
            "graph template accepts {} input image(s), submission has {}",
            load_nodes.len(),
            input_refs.len()
        )));
    }

    for (node_id, input_ref) in load_nodes.iter().zip(input_refs) {
        nodes[node_id]["inputs"]["image"] = serde_json::Value::String(input_ref.clone());
    }

    Ok(graph)
}
