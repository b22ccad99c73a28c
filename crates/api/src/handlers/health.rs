//! Health check handler.

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use autodash_core::job::ALL_PIPELINE_KINDS;

/// GET /health
///
/// Liveness probe; also enumerates the mounted automation services so
/// callers can discover what this façade multiplexes.
pub async fn health_check() -> impl IntoResponse {
    let services: Vec<&str> = ALL_PIPELINE_KINDS.iter().map(|k| k.as_str()).collect();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "services": services,
    }))
}
