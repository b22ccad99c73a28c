//! Integration tests for the health endpoint and general HTTP behaviour.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, StaticPipeline};

fn stub() -> Arc<StaticPipeline> {
    Arc::new(StaticPipeline {
        file_name: "out.png".to_string(),
        bytes: b"bytes".to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with the mounted services
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_services() {
    let app = build_test_app(stub()).await;
    let response = get(&app.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());

    let services: Vec<&str> = json["services"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(services, vec!["mask", "workflow", "rename", "promptmap"]);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(stub()).await;
    let response = get(&app.app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app(stub()).await;
    let response = get(&app.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");

    // The value should be a valid UUID (36 chars with hyphens).
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}
