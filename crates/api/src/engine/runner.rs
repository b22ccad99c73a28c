//! Background job runner.
//!
//! Submission hands a job id to [`JobRunner::dispatch`], which enqueues
//! it on a bounded channel; the dispatch loop pulls ids off the queue,
//! takes a semaphore permit (`MAX_CONCURRENT_JOBS`), and spawns one
//! execution task per job. The submission request never waits for the
//! pipeline.
//!
//! Every execution commits exactly one terminal transition: pipeline
//! errors, deadline overruns, and even panics are captured and recorded
//! as FAILED. At-most-one execution per job is guaranteed by the queue
//! (each id is delivered once) plus the store's transition guard, which
//! also resolves races against cancellation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use autodash_artifacts::ArtifactStore;
use autodash_core::{CoreError, Failure, Job, JobId, JobState, Transition};
use autodash_pipeline::{ArtifactPayload, PipelineSet};
use autodash_store::JobStore;

/// Tuning knobs for the runner, all surfaced as configuration.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Maximum number of concurrently executing jobs.
    pub max_concurrent: usize,
    /// Dispatch queue depth. Sized to the store capacity so the queue
    /// cannot refuse a job the store accepted, except under races.
    pub queue_depth: usize,
    /// Per-job pipeline deadline.
    pub pipeline_timeout: Duration,
}

/// Executes queued jobs against their pipelines, off the request path.
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    pipelines: PipelineSet,
    tx: mpsc::Sender<JobId>,
    queue_depth: usize,
    pipeline_timeout: Duration,
}

impl JobRunner {
    /// Start the dispatch loop and return the runner handle.
    ///
    /// The loop runs until `cancel` is triggered; in-flight executions
    /// finish their terminal transition on their own tasks.
    pub fn start(
        store: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        pipelines: PipelineSet,
        options: RunnerOptions,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(options.queue_depth);
        let runner = Arc::new(Self {
            store,
            artifacts,
            pipelines,
            tx,
            queue_depth: options.queue_depth,
            pipeline_timeout: options.pipeline_timeout,
        });

        tokio::spawn(Self::dispatch_loop(
            Arc::clone(&runner),
            rx,
            options.max_concurrent,
            cancel,
        ));

        runner
    }

    /// Enqueue a job for execution. Does not wait for the pipeline.
    ///
    /// Fails with `Capacity` if the queue refuses the id; the caller is
    /// expected to roll back the freshly created record.
    pub fn dispatch(&self, job_id: JobId) -> Result<(), CoreError> {
        self.tx.try_send(job_id).map_err(|_| CoreError::Capacity {
            limit: self.queue_depth,
        })
    }

    /// Pull ids off the queue and spawn one execution task per job,
    /// bounded by the concurrency semaphore.
    async fn dispatch_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<JobId>,
        max_concurrent: usize,
        cancel: CancellationToken,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        tracing::info!(max_concurrent, "Job runner started");

        loop {
            let job_id = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job runner shutting down");
                    break;
                }
                received = rx.recv() => match received {
                    Some(job_id) => job_id,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job runner shutting down");
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let runner = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = runner.execute(job_id).await {
                    tracing::error!(job_id = %job_id, error = %e, "Job execution fault");
                }
            });
        }
    }

    /// Execute one job to a terminal state.
    ///
    /// Rejects double execution (`AlreadyRunning` / `AlreadyTerminal`);
    /// quietly skips jobs that were cancelled while queued.
    pub(crate) async fn execute(&self, job_id: JobId) -> Result<(), CoreError> {
        let job = self.store.get(job_id).await?;
        match job.state {
            JobState::Queued => {}
            JobState::Running => return Err(CoreError::AlreadyRunning { id: job_id }),
            state => {
                // A job cancelled while queued still comes off the queue
                // once; that is a skip, not a double execution.
                if matches!(&job.error, Some(f) if f.kind == autodash_core::FailureKind::Cancelled)
                {
                    tracing::info!(job_id = %job_id, "Job cancelled before execution, skipping");
                    return Ok(());
                }
                return Err(CoreError::AlreadyTerminal { id: job_id, state });
            }
        }

        // Claim via the transition guard. Losing here means the job was
        // cancelled between the snapshot above and now; that is not a fault.
        match self.store.transition(job_id, &Transition::Start).await {
            Ok(_) => {}
            Err(CoreError::InvalidTransition { from, .. }) => {
                tracing::info!(job_id = %job_id, %from, "Job no longer queued, skipping execution");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        tracing::info!(job_id = %job_id, kind = %job.kind, "Job started");

        let outcome = self.run_pipeline(&job).await;
        self.commit(job_id, outcome).await
    }

    /// Invoke the pipeline under the deadline, capturing errors and
    /// panics as failure payloads. This never short-circuits: both
    /// paths flow into [`Self::commit`].
    async fn run_pipeline(&self, job: &Job) -> Result<ArtifactPayload, Failure> {
        let Some(pipeline) = self.pipelines.get(job.kind) else {
            return Err(Failure::internal(format!(
                "No pipeline mounted for kind '{}'",
                job.kind
            )));
        };

        let deadline = self.pipeline_timeout;
        let guarded =
            AssertUnwindSafe(tokio::time::timeout(deadline, pipeline.execute(&job.input_refs)))
                .catch_unwind()
                .await;

        match guarded {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(e))) => Err(Failure::pipeline(e.to_string())),
            Ok(Err(_elapsed)) => Err(Failure::timeout(format!(
                "Pipeline exceeded the {}s deadline",
                deadline.as_secs()
            ))),
            Err(_panic) => Err(Failure::internal("Pipeline panicked".to_string())),
        }
    }

    /// Commit the single terminal transition for this execution.
    ///
    /// The artifact is written before COMPLETED so a poller that sees
    /// the state can always download the bytes. If the transition loses
    /// a race (the job was cancelled mid-run), the orphaned artifact is
    /// discarded.
    async fn commit(
        &self,
        job_id: JobId,
        outcome: Result<ArtifactPayload, Failure>,
    ) -> Result<(), CoreError> {
        let transition = match outcome {
            Ok(payload) => {
                let key = format!("{job_id}_{}", payload.file_name);
                match self.artifacts.put(&key, &payload.bytes).await {
                    Ok(artifact_ref) => Transition::Complete { artifact_ref },
                    Err(e) => Transition::Fail {
                        failure: Failure::storage(e.to_string()),
                    },
                }
            }
            Err(failure) => Transition::Fail { failure },
        };

        match self.store.transition(job_id, &transition).await {
            Ok(job) => {
                match (&job.state, &job.error) {
                    (JobState::Completed, _) => tracing::info!(
                        job_id = %job_id,
                        artifact_ref = job.artifact_ref.as_deref().unwrap_or(""),
                        "Job completed",
                    ),
                    (_, Some(failure)) => tracing::warn!(
                        job_id = %job_id,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Job failed",
                    ),
                    _ => {}
                }
                Ok(())
            }
            Err(CoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    job_id = %job_id,
                    %from,
                    "Terminal transition lost a race, discarding result",
                );
                if let Transition::Complete { artifact_ref } = &transition {
                    if let Err(e) = self.artifacts.delete(artifact_ref).await {
                        tracing::warn!(
                            job_id = %job_id,
                            error = %e,
                            "Failed to discard orphaned artifact",
                        );
                    }
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
