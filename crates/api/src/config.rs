use std::path::PathBuf;
use std::time::Duration;

/// Which job store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-lifetime in-memory table (default).
    Memory,
    /// PostgreSQL table via sqlx; requires `DATABASE_URL`.
    Postgres,
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Job store backend (default: memory).
    pub store_backend: StoreBackend,
    /// Connection string for the postgres backend.
    pub database_url: Option<String>,
    /// Maximum number of tracked jobs; `create` fails beyond this.
    pub max_tracked_jobs: usize,
    /// Maximum number of concurrently running jobs.
    pub max_concurrent_jobs: usize,
    /// Per-job pipeline deadline.
    pub pipeline_timeout: Duration,
    /// How long terminal jobs (and their artifacts) are retained.
    pub retention: Duration,
    /// How often the retention sweep runs.
    pub cleanup_interval: Duration,
    /// Artifact storage root directory.
    pub artifact_root: PathBuf,
    /// Namespace (subdirectory) under the artifact root.
    pub artifact_namespace: String,
    /// ComfyUI base URL (mask and workflow pipelines).
    pub comfyui_url: String,
    /// Node-graph template for the mask pipeline.
    pub mask_graph_path: PathBuf,
    /// Node-graph template for the background-change workflow pipeline.
    pub workflow_graph_path: PathBuf,
    /// Face-rename service base URL.
    pub rename_url: String,
    /// Prompt-generation service base URL.
    pub promptmap_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                   |
    /// |---------------------------|---------------------------|
    /// | `HOST`                    | `0.0.0.0`                 |
    /// | `PORT`                    | `3000`                    |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`   |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                      |
    /// | `STORE_BACKEND`           | `memory`                  |
    /// | `DATABASE_URL`            | unset                     |
    /// | `MAX_TRACKED_JOBS`        | `1024`                    |
    /// | `MAX_CONCURRENT_JOBS`     | `4`                       |
    /// | `PIPELINE_TIMEOUT_SECS`   | `600`                     |
    /// | `RETENTION_SECS`          | `86400`                   |
    /// | `CLEANUP_INTERVAL_SECS`   | `3600`                    |
    /// | `ARTIFACT_ROOT`           | `./artifacts`             |
    /// | `ARTIFACT_NAMESPACE`      | `autodash`                |
    /// | `COMFYUI_URL`             | `http://127.0.0.1:8188`   |
    /// | `MASK_GRAPH_PATH`         | `graphs/mask.json`        |
    /// | `WORKFLOW_GRAPH_PATH`     | `graphs/workflow.json`    |
    /// | `RENAME_URL`              | `http://127.0.0.1:8090`   |
    /// | `PROMPTMAP_URL`           | `http://127.0.0.1:8091`   |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = env_or("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let store_backend = match env_or("STORE_BACKEND", "memory").as_str() {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres,
            other => panic!("STORE_BACKEND must be 'memory' or 'postgres', got '{other}'"),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_u64("REQUEST_TIMEOUT_SECS", "30"),
            store_backend,
            database_url: std::env::var("DATABASE_URL").ok(),
            max_tracked_jobs: parse_u64("MAX_TRACKED_JOBS", "1024") as usize,
            max_concurrent_jobs: parse_u64("MAX_CONCURRENT_JOBS", "4") as usize,
            pipeline_timeout: Duration::from_secs(parse_u64("PIPELINE_TIMEOUT_SECS", "600")),
            retention: Duration::from_secs(parse_u64("RETENTION_SECS", "86400")),
            cleanup_interval: Duration::from_secs(parse_u64("CLEANUP_INTERVAL_SECS", "3600")),
            artifact_root: PathBuf::from(env_or("ARTIFACT_ROOT", "./artifacts")),
            artifact_namespace: env_or("ARTIFACT_NAMESPACE", "autodash"),
            comfyui_url: env_or("COMFYUI_URL", "http://127.0.0.1:8188"),
            mask_graph_path: PathBuf::from(env_or("MASK_GRAPH_PATH", "graphs/mask.json")),
            workflow_graph_path: PathBuf::from(env_or(
                "WORKFLOW_GRAPH_PATH",
                "graphs/workflow.json",
            )),
            rename_url: env_or("RENAME_URL", "http://127.0.0.1:8090"),
            promptmap_url: env_or("PROMPTMAP_URL", "http://127.0.0.1:8091"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_u64(key: &str, default: &str) -> u64 {
    env_or(key, default)
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a valid integer"))
}
