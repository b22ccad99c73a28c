//! Integration tests for the submit / poll / download / cancel surface.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    body_bytes, body_json, build_test_app, get, post_json, submit, wait_for_state,
    FailingPipeline, HangingPipeline, StaticPipeline,
};

use autodash_core::{JobState, PipelineKind};

// ---------------------------------------------------------------------------
// Happy path: submit -> poll -> download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_poll_download_round_trip() {
    let app = build_test_app(Arc::new(StaticPipeline {
        file_name: "cat_masked.png".to_string(),
        bytes: b"masked-cat-bytes".to_vec(),
    }))
    .await;

    let job_id = submit(&app.app, PipelineKind::Mask, &["cat.png"]).await;

    let json = wait_for_state(&app.app, &job_id, JobState::Completed).await;
    assert_eq!(json["data"]["kind"], "mask");
    assert!(json["data"].get("error").is_none());

    let response = get(&app.app, &format!("/api/v1/jobs/{job_id}/download")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("cat_masked.png"), "{disposition}");

    assert_eq!(body_bytes(response).await, b"masked-cat-bytes");
}

// ---------------------------------------------------------------------------
// Submission validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_kind_is_invalid_input_and_creates_nothing() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;

    let response = post_json(
        &app.app,
        "/api/v1/jobs",
        serde_json::json!({ "kind": "resize", "input_refs": ["cat.png"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_INPUT");

    assert_eq!(app.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_input_refs_is_invalid_input_and_creates_nothing() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;

    let response = post_json(
        &app.app,
        "/api/v1/jobs",
        serde_json::json!({ "kind": "mask", "input_refs": [] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_INPUT");

    // No job id leaked, store size unchanged.
    assert_eq!(app.store.count().await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Unknown ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_of_unknown_job_is_404() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;
    let missing = uuid::Uuid::now_v7();

    let response = get(&app.app, &format!("/api/v1/jobs/{missing}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn download_of_unknown_job_is_404() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;
    let missing = uuid::Uuid::now_v7();

    let response = get(&app.app, &format!("/api/v1/jobs/{missing}/download")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "JOB_NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Download before completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_of_fresh_job_is_not_ready() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;
    let job_id = submit(&app.app, PipelineKind::Workflow, &["cat.png", "cat_mask.png"]).await;

    let response = get(&app.app, &format!("/api/v1/jobs/{job_id}/download")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "JOB_NOT_READY");
}

// ---------------------------------------------------------------------------
// Failure propagation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pipeline_failure_is_reported_deterministically() {
    let app = build_test_app(Arc::new(FailingPipeline {
        message: "model unavailable".to_string(),
    }))
    .await;

    let job_id = submit(&app.app, PipelineKind::Promptmap, &["look_01.png"]).await;

    let json = wait_for_state(&app.app, &job_id, JobState::Failed).await;
    assert_eq!(json["data"]["error"]["kind"], "PipelineError");
    assert!(json["data"]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("model unavailable"));

    // Terminal states are stable: a second poll returns the identical error.
    let again = body_json(get(&app.app, &format!("/api/v1/jobs/{job_id}")).await).await;
    assert_eq!(again["data"]["error"], json["data"]["error"]);

    // Download surfaces the stored failure.
    let response = get(&app.app, &format!("/api/v1/jobs/{job_id}/download")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "JOB_FAILED");
    assert_eq!(body["detail"]["kind"], "PipelineError");
    assert!(body["detail"]["message"]
        .as_str()
        .unwrap()
        .contains("model unavailable"));
}

// ---------------------------------------------------------------------------
// Distinct ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_submissions_get_distinct_ids() {
    let app = build_test_app(Arc::new(StaticPipeline {
        file_name: "out.png".to_string(),
        bytes: b"x".to_vec(),
    }))
    .await;

    let (a, b) = tokio::join!(
        submit(&app.app, PipelineKind::Mask, &["a.png"]),
        submit(&app.app, PipelineKind::Mask, &["b.png"]),
    );
    assert_ne!(a, b);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_moves_job_to_failed_with_cancelled_kind() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;
    let job_id = submit(&app.app, PipelineKind::Rename, &["face.png"]).await;

    let response = post_json(
        &app.app,
        &format!("/api/v1/jobs/{job_id}/cancel"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["state"], "FAILED");
    assert_eq!(json["data"]["error"]["kind"], "Cancelled");

    // A second cancel meets a terminal job: conflict, not a new transition.
    let response = post_json(
        &app.app,
        &format!("/api/v1/jobs/{job_id}/cancel"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_returns_jobs_newest_first() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;
    let first = submit(&app.app, PipelineKind::Mask, &["a.png"]).await;
    let second = submit(&app.app, PipelineKind::Mask, &["b.png"]).await;

    let json = body_json(get(&app.app, "/api/v1/jobs").await).await;
    let jobs = json["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["job_id"], second.as_str());
    assert_eq!(jobs[1]["job_id"], first.as_str());

    let limited = body_json(get(&app.app, "/api/v1/jobs?limit=1&offset=1").await).await;
    let jobs = limited["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job_id"], first.as_str());
}

// ---------------------------------------------------------------------------
// Malformed id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_job_id_is_rejected() {
    let app = build_test_app(Arc::new(HangingPipeline)).await;
    let response = get(&app.app, "/api/v1/jobs/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
