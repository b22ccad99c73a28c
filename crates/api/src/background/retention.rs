//! Periodic cleanup of expired jobs.
//!
//! Terminal jobs whose `updated_at` is older than the retention window
//! are removed from the job store together with their artifacts.
//! Non-terminal jobs are never expired here: a job stuck in RUNNING is
//! a liveness bug to surface in the logs, not something to delete.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use autodash_artifacts::ArtifactStore;
use autodash_core::CoreError;
use autodash_store::JobStore;

/// Run the retention sweep loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    retention: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Job retention sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_once(&store, &artifacts, retention).await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "Retention sweep: purged expired jobs");
                    }
                    Ok(_) => {
                        tracing::debug!("Retention sweep: nothing to purge");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Retention sweep failed");
                    }
                }
            }
        }
    }
}

/// One sweep: reclaim artifact storage, then drop the store records.
///
/// If an artifact cannot be deleted the job is kept for the next sweep
/// rather than leaking the bytes forever.
pub async fn sweep_once(
    store: &Arc<dyn JobStore>,
    artifacts: &Arc<dyn ArtifactStore>,
    retention: Duration,
) -> Result<usize, CoreError> {
    let cutoff = Utc::now() - chrono::Duration::seconds(retention.as_secs() as i64);
    let expired = store.list_expired(cutoff).await?;

    let mut removed = 0;
    for job in expired {
        if let Some(artifact_ref) = &job.artifact_ref {
            if let Err(e) = artifacts.delete(artifact_ref).await {
                tracing::warn!(
                    job_id = %job.id,
                    error = %e,
                    "Failed to reclaim artifact, keeping job until next sweep",
                );
                continue;
            }
        }
        store.delete(job.id).await?;
        removed += 1;
    }

    Ok(removed)
}
