//! Domain model for the autodash job service.
//!
//! Everything the other crates agree on lives here: the job lifecycle
//! state machine, failure payloads, the pipeline kind enum, input
//! validation, and the shared error taxonomy. This crate has no
//! dependency on the rest of the workspace.

pub mod error;
pub mod input;
pub mod job;
pub mod types;

pub use error::CoreError;
pub use job::{Failure, FailureKind, Job, JobState, PipelineKind, Transition, ALL_PIPELINE_KINDS};
pub use types::{JobId, Timestamp};
