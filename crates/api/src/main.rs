use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autodash_api::config::{ServerConfig, StoreBackend};
use autodash_api::engine::{JobRunner, RunnerOptions};
use autodash_api::{background, router, state};

use autodash_artifacts::{ArtifactStore, FsArtifactStore};
use autodash_core::PipelineKind;
use autodash_pipeline::{
    ComfyClient, MaskPipeline, PipelineSet, PromptmapPipeline, RenamePipeline, WorkflowPipeline,
};
use autodash_store::{JobStore, MemoryJobStore, PgJobStore};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autodash_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store: Arc<dyn JobStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!(capacity = config.max_tracked_jobs, "Using in-memory job store");
            Arc::new(MemoryJobStore::new(config.max_tracked_jobs))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set when STORE_BACKEND=postgres");
            let store = PgJobStore::connect(url, config.max_tracked_jobs)
                .await
                .expect("Failed to connect to job store database");
            tracing::info!(capacity = config.max_tracked_jobs, "Using postgres job store");
            Arc::new(store)
        }
    };

    // --- Artifact storage ---
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(
        FsArtifactStore::open(&config.artifact_root, &config.artifact_namespace)
            .await
            .expect("Failed to open artifact storage"),
    );
    tracing::info!(
        root = %config.artifact_root.display(),
        namespace = %config.artifact_namespace,
        "Artifact storage ready"
    );

    // --- Pipelines ---
    let pipelines = build_pipelines(&config);

    // --- Runner ---
    let shutdown = CancellationToken::new();
    let runner = JobRunner::start(
        Arc::clone(&store),
        Arc::clone(&artifacts),
        pipelines,
        RunnerOptions {
            max_concurrent: config.max_concurrent_jobs,
            queue_depth: config.max_tracked_jobs,
            pipeline_timeout: config.pipeline_timeout,
        },
        shutdown.clone(),
    );

    // --- Retention sweep ---
    let retention_handle = tokio::spawn(background::retention::run(
        Arc::clone(&store),
        Arc::clone(&artifacts),
        config.retention,
        config.cleanup_interval,
        shutdown.clone(),
    ));

    // --- App state & router ---
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        artifacts,
        runner,
    };
    let app = router::build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wire the four pipeline variants to their configured upstreams.
fn build_pipelines(config: &ServerConfig) -> PipelineSet {
    let mask_graph = load_graph(&config.mask_graph_path);
    let workflow_graph = load_graph(&config.workflow_graph_path);

    PipelineSet::new()
        .mount(
            PipelineKind::Mask,
            Arc::new(MaskPipeline::new(
                ComfyClient::new(&config.comfyui_url),
                mask_graph,
            )),
        )
        .mount(
            PipelineKind::Workflow,
            Arc::new(WorkflowPipeline::new(
                ComfyClient::new(&config.comfyui_url),
                workflow_graph,
            )),
        )
        .mount(
            PipelineKind::Rename,
            Arc::new(RenamePipeline::new(&config.rename_url)),
        )
        .mount(
            PipelineKind::Promptmap,
            Arc::new(PromptmapPipeline::new(&config.promptmap_url)),
        )
}

/// Load a ComfyUI graph template. Malformed templates fail startup.
fn load_graph(path: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read graph template {}: {e}", path.display()));
    serde_json::from_str(&raw)
        .unwrap_or_else(|e| panic!("Malformed graph template {}: {e}", path.display()))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
