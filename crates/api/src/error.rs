use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use autodash_artifacts::ArtifactError;
use autodash_core::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and artifact storage faults.
/// Implements [`IntoResponse`] to produce consistent
/// `{ "error", "code" }` JSON error responses; a failed job's download
/// additionally carries the stored failure under `detail`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `autodash_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An artifact storage error.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut detail = None;

        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", core.to_string())
                }
                CoreError::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
                }
                CoreError::NotReady { .. } => {
                    (StatusCode::CONFLICT, "JOB_NOT_READY", core.to_string())
                }
                CoreError::Failed { failure, .. } => {
                    detail = Some(json!(failure));
                    (StatusCode::CONFLICT, "JOB_FAILED", core.to_string())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Capacity { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CAPACITY",
                    core.to_string(),
                ),
                // Consistency guards: a logic bug if they reach a caller.
                // Observable in the logs, sanitized on the wire.
                CoreError::InvalidTransition { .. }
                | CoreError::AlreadyRunning { .. }
                | CoreError::AlreadyTerminal { .. } => {
                    tracing::error!(error = %core, "Job store consistency guard tripped");
                    internal_error()
                }
                CoreError::Storage(msg) | CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal error");
                    internal_error()
                }
            },

            AppError::Artifact(err) => {
                tracing::error!(error = %err, "Artifact storage error");
                internal_error()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(detail) = detail {
            body["detail"] = detail;
        }

        (status, axum::Json(body)).into_response()
    }
}

fn internal_error() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
