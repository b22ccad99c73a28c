#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use autodash_api::config::{ServerConfig, StoreBackend};
use autodash_api::engine::{JobRunner, RunnerOptions};
use autodash_api::router::build_app_router;
use autodash_api::state::AppState;
use autodash_artifacts::{ArtifactStore, FsArtifactStore};
use autodash_core::{JobState, PipelineKind, ALL_PIPELINE_KINDS};
use autodash_pipeline::{ArtifactPayload, Pipeline, PipelineError, PipelineSet};
use autodash_store::{JobStore, MemoryJobStore};

/// A test application: the full middleware'd router over a memory
/// store, tempdir-backed artifacts, and stub pipelines.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<dyn JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    _artifact_dir: tempfile::TempDir,
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(artifact_root: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        store_backend: StoreBackend::Memory,
        database_url: None,
        max_tracked_jobs: 64,
        max_concurrent_jobs: 2,
        pipeline_timeout: Duration::from_secs(30),
        retention: Duration::from_secs(86400),
        cleanup_interval: Duration::from_secs(3600),
        artifact_root,
        artifact_namespace: "autodash-test".to_string(),
        comfyui_url: "http://127.0.0.1:8188".to_string(),
        mask_graph_path: PathBuf::from("graphs/mask.json"),
        workflow_graph_path: PathBuf::from("graphs/workflow.json"),
        rename_url: "http://127.0.0.1:8090".to_string(),
        promptmap_url: "http://127.0.0.1:8091".to_string(),
    }
}

/// Build the full application with the given stub mounted for every
/// pipeline kind. Mirrors the wiring in `main.rs` minus the real
/// upstreams.
pub async fn build_test_app(pipeline: Arc<dyn Pipeline>) -> TestApp {
    let artifact_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(artifact_dir.path().to_path_buf());

    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new(config.max_tracked_jobs));
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(
        FsArtifactStore::open(&config.artifact_root, &config.artifact_namespace)
            .await
            .expect("artifact store"),
    );

    let mut pipelines = PipelineSet::new();
    for kind in ALL_PIPELINE_KINDS {
        pipelines = pipelines.mount(kind, Arc::clone(&pipeline));
    }

    let runner = JobRunner::start(
        Arc::clone(&store),
        Arc::clone(&artifacts),
        pipelines,
        RunnerOptions {
            max_concurrent: config.max_concurrent_jobs,
            queue_depth: config.max_tracked_jobs,
            pipeline_timeout: config.pipeline_timeout,
        },
        CancellationToken::new(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::clone(&store),
        artifacts: Arc::clone(&artifacts),
        runner,
    };

    TestApp {
        app: build_app_router(state, &config),
        store,
        artifacts,
        _artifact_dir: artifact_dir,
    }
}

// ---------------------------------------------------------------------------
// Stub pipelines
// ---------------------------------------------------------------------------

/// Succeeds immediately with a fixed artifact.
pub struct StaticPipeline {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
impl Pipeline for StaticPipeline {
    async fn execute(&self, _input_refs: &[String]) -> Result<ArtifactPayload, PipelineError> {
        Ok(ArtifactPayload {
            file_name: self.file_name.clone(),
            bytes: self.bytes.clone(),
        })
    }
}

/// Fails immediately with the given message.
pub struct FailingPipeline {
    pub message: String,
}

#[async_trait]
impl Pipeline for FailingPipeline {
    async fn execute(&self, _input_refs: &[String]) -> Result<ArtifactPayload, PipelineError> {
        Err(PipelineError::Request(self.message.clone()))
    }
}

/// Never finishes within a test's lifetime; keeps jobs non-terminal.
pub struct HangingPipeline;

#[async_trait]
impl Pipeline for HangingPipeline {
    async fn execute(&self, _input_refs: &[String]) -> Result<ArtifactPayload, PipelineError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Err(PipelineError::Request("unreachable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Job helpers
// ---------------------------------------------------------------------------

/// Submit a job and return its id, asserting a 201.
pub async fn submit(app: &Router, kind: PipelineKind, input_refs: &[&str]) -> String {
    let response = post_json(
        app,
        "/api/v1/jobs",
        serde_json::json!({
            "kind": kind.as_str(),
            "input_refs": input_refs,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["state"], "QUEUED");
    json["data"]["job_id"].as_str().expect("job_id").to_string()
}

/// Poll the status endpoint until the job reaches `target` (or fail
/// after ~5 seconds).
pub async fn wait_for_state(app: &Router, job_id: &str, target: JobState) -> serde_json::Value {
    for _ in 0..250 {
        let response = get(app, &format!("/api/v1/jobs/{job_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["data"]["state"] == target.as_str() {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} did not reach {target} in time");
}
