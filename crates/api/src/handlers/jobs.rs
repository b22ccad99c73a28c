//! Handlers for the `/jobs` resource: the submit / poll / download /
//! cancel surface over the job store and runner.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use autodash_core::input::validate_input_refs;
use autodash_core::{
    CoreError, Failure, Job, JobId, JobState, PipelineKind, Timestamp, Transition,
};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum page size for job listing.
const MAX_LIMIT: usize = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitJob {
    /// One of `mask`, `workflow`, `rename`, `promptmap`.
    pub kind: String,
    /// References to previously staged input images.
    pub input_refs: Vec<String>,
}

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct JobSubmitted {
    pub job_id: JobId,
    pub state: JobState,
}

/// Externally visible snapshot of a job.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: JobId,
    pub kind: PipelineKind,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind,
            state: job.state,
            error: job.error,
            artifact_ref: job.artifact_ref,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<usize>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<usize>,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Validate the submission, create the QUEUED record, and hand the job
/// to the runner. Returns 201 immediately; completion is observed by
/// polling. No job record is left behind if validation or dispatch
/// fails.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let kind: PipelineKind = input.kind.parse()?;
    validate_input_refs(&input.input_refs)?;

    let job = state.store.create(kind, input.input_refs).await?;

    if let Err(e) = state.runner.dispatch(job.id) {
        // Roll back so the caller's retry does not meet a ghost record.
        let _ = state.store.delete(job.id).await;
        return Err(e.into());
    }

    tracing::info!(job_id = %job.id, kind = %job.kind, "Job submitted");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobSubmitted {
                job_id: job.id,
                state: job.state,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Page through tracked jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let jobs = state.store.list(limit, offset).await?;
    let views: Vec<JobView> = jobs.into_iter().map(JobView::from).collect();
    Ok(Json(DataResponse { data: views }))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Read-only snapshot. Terminal states are stable: polling a FAILED job
/// returns the stored error identically on every call.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(job_id).await?;
    Ok(Json(DataResponse {
        data: JobView::from(job),
    }))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/download
///
/// Stream the artifact of a COMPLETED job. QUEUED/RUNNING answer
/// `JOB_NOT_READY` (poll again); FAILED answers `JOB_FAILED` carrying
/// the stored error.
pub async fn download_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(job_id).await?;

    match job.state {
        JobState::Queued | JobState::Running => Err(CoreError::NotReady {
            id: job_id,
            state: job.state,
        }
        .into()),
        JobState::Failed => {
            let failure = job.error.unwrap_or_else(|| {
                // COMPLETED implies artifact, FAILED implies error; a hole
                // here is a store bug worth surfacing loudly.
                tracing::error!(job_id = %job_id, "FAILED job has no stored error");
                Failure::internal("failure detail missing".to_string())
            });
            Err(CoreError::Failed {
                id: job_id,
                failure,
            }
            .into())
        }
        JobState::Completed => {
            let artifact_ref = job.artifact_ref.ok_or_else(|| {
                tracing::error!(job_id = %job_id, "COMPLETED job has no artifact reference");
                CoreError::Internal("artifact reference missing".to_string())
            })?;

            let (size, reader) = state.artifacts.get(&artifact_ref).await?;
            let file_name = artifact_ref.rsplit('/').next().unwrap_or(&artifact_ref);

            let headers = [
                (
                    header::CONTENT_TYPE,
                    content_type_for(&artifact_ref).to_string(),
                ),
                (header::CONTENT_LENGTH, size.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ];

            Ok((headers, Body::from_stream(ReaderStream::new(reader))).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Move a QUEUED or RUNNING job to FAILED with a `Cancelled` error.
/// Racing the runner's own terminal transition is safe: the store
/// commits exactly one of the two, and the loser here surfaces as 409.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let transition = Transition::Fail {
        failure: Failure::cancelled("Cancelled by caller".to_string()),
    };

    match state.store.transition(job_id, &transition).await {
        Ok(job) => {
            tracing::info!(job_id = %job_id, "Job cancelled");
            Ok((
                StatusCode::ACCEPTED,
                Json(DataResponse {
                    data: JobView::from(job),
                }),
            ))
        }
        Err(CoreError::InvalidTransition { from, .. }) => Err(CoreError::Conflict(format!(
            "Job is already {from} and cannot be cancelled"
        ))
        .into()),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Content type for an artifact reference, by extension.
fn content_type_for(artifact_ref: &str) -> &'static str {
    let ext = artifact_ref
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
