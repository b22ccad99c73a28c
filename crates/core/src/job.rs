//! Job lifecycle model: states, transitions, failure payloads.
//!
//! The state machine is strictly forward: QUEUED -> RUNNING ->
//! {COMPLETED, FAILED}. Cancellation is the one permitted shortcut,
//! QUEUED -> FAILED, so a job pulled out of the queue before execution
//! still ends in a terminal state. Terminal states accept no further
//! transitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// Lifecycle state of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    /// Wire/database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }

    /// COMPLETED and FAILED accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether a single transition from `self` to `next` respects the
    /// lifecycle order. Same-state "transitions" are rejected so every
    /// committed edge is a real state change.
    pub fn can_advance_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Running)
                | (JobState::Queued, JobState::Failed)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            other => Err(CoreError::Internal(format!("Unknown job state '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure payload
// ---------------------------------------------------------------------------

/// Classification of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The pipeline itself reported an error.
    #[serde(rename = "PipelineError")]
    Pipeline,
    /// The pipeline exceeded the configured deadline.
    Timeout,
    /// The job was cancelled by the caller before it finished.
    Cancelled,
    /// The produced artifact could not be written to storage.
    #[serde(rename = "StorageError")]
    Storage,
    /// Anything else, including a panicking pipeline.
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Pipeline => "PipelineError",
            FailureKind::Timeout => "Timeout",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::Storage => "StorageError",
            FailureKind::Internal => "Internal",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "PipelineError" => Ok(FailureKind::Pipeline),
            "Timeout" => Ok(FailureKind::Timeout),
            "Cancelled" => Ok(FailureKind::Cancelled),
            "StorageError" => Ok(FailureKind::Storage),
            "Internal" => Ok(FailureKind::Internal),
            other => Err(CoreError::Internal(format!(
                "Unknown failure kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure detail recorded on a FAILED job and returned
/// unchanged on every subsequent status or download call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Pipeline,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Storage,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Internal,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// ---------------------------------------------------------------------------
// Pipeline kind
// ---------------------------------------------------------------------------

/// Which of the four automation backends a job runs against.
///
/// The store and runner are agnostic to the kind; only the pipeline
/// registry cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Mask,
    Workflow,
    Rename,
    Promptmap,
}

/// All mounted pipeline kinds, in route order.
pub const ALL_PIPELINE_KINDS: [PipelineKind; 4] = [
    PipelineKind::Mask,
    PipelineKind::Workflow,
    PipelineKind::Rename,
    PipelineKind::Promptmap,
];

impl PipelineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineKind::Mask => "mask",
            PipelineKind::Workflow => "workflow",
            PipelineKind::Rename => "rename",
            PipelineKind::Promptmap => "promptmap",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mask" => Ok(PipelineKind::Mask),
            "workflow" => Ok(PipelineKind::Workflow),
            "rename" => Ok(PipelineKind::Rename),
            "promptmap" => Ok(PipelineKind::Promptmap),
            other => Err(CoreError::InvalidInput(format!(
                "Unknown pipeline kind '{other}'. Must be one of: mask, workflow, rename, promptmap"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// A single forward edge through the job lifecycle, together with the
/// payload that edge records.
#[derive(Debug, Clone)]
pub enum Transition {
    /// QUEUED -> RUNNING.
    Start,
    /// RUNNING -> COMPLETED, recording the artifact location.
    Complete { artifact_ref: String },
    /// {QUEUED, RUNNING} -> FAILED, recording the failure.
    Fail { failure: Failure },
}

impl Transition {
    pub fn target_state(&self) -> JobState {
        match self {
            Transition::Start => JobState::Running,
            Transition::Complete { .. } => JobState::Completed,
            Transition::Fail { .. } => JobState::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// One submitted unit of work tracked through its lifecycle.
///
/// Exactly one of `artifact_ref` / `error` is set once the job is
/// terminal (`COMPLETED` / `FAILED` respectively); both are absent
/// before that. [`Job::apply`] is the only mutation path, so every
/// store backend enforces the same matrix.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub kind: PipelineKind,
    pub input_refs: Vec<String>,
    pub state: JobState,
    pub artifact_ref: Option<String>,
    pub error: Option<Failure>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Build a fresh QUEUED record with a newly allocated id.
    pub fn new(kind: PipelineKind, input_refs: Vec<String>, now: Timestamp) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            kind,
            input_refs,
            state: JobState::Queued,
            artifact_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one transition, enforcing the lifecycle order.
    ///
    /// Fails with `InvalidTransition` when the requested edge is not in
    /// the matrix; on success the target state, its payload, and
    /// `updated_at` are committed together.
    pub fn apply(&mut self, transition: &Transition, now: Timestamp) -> Result<(), CoreError> {
        let target = transition.target_state();
        if !self.state.can_advance_to(target) {
            return Err(CoreError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: target,
            });
        }

        match transition {
            Transition::Start => {}
            Transition::Complete { artifact_ref } => {
                self.artifact_ref = Some(artifact_ref.clone());
            }
            Transition::Fail { failure } => {
                self.error = Some(failure.clone());
            }
        }

        self.state = target;
        self.updated_at = now;
        Ok(())
    }

    /// Whether the retention sweep may reclaim this job at `cutoff`.
    /// Non-terminal jobs are never expired.
    pub fn is_expired(&self, cutoff: Timestamp) -> bool {
        self.state.is_terminal() && self.updated_at < cutoff
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
