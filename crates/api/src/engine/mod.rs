//! Job execution engine: the worker pool between submission and the
//! pipelines.

pub mod runner;

pub use runner::{JobRunner, RunnerOptions};
