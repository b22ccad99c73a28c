//! In-memory job store backend.
//!
//! A capacity-bounded table behind a `tokio::sync::RwLock`. The write
//! lock makes every mutation atomic per job id; [`Job::apply`] enforces
//! the transition matrix so this backend and the Postgres one reject
//! exactly the same edges.

use std::collections::HashMap;

use async_trait::async_trait;
use autodash_core::{CoreError, Job, JobId, PipelineKind, Timestamp, Transition};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::JobStore;

/// Process-lifetime job table. The default backend: suits single-node
/// deployments where a restart is allowed to forget finished work.
pub struct MemoryJobStore {
    capacity: usize,
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create a store that tracks at most `capacity` jobs at once.
    /// Terminal jobs count against the limit until the retention sweep
    /// removes them.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(
        &self,
        kind: PipelineKind,
        input_refs: Vec<String>,
    ) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.len() >= self.capacity {
            return Err(CoreError::Capacity {
                limit: self.capacity,
            });
        }
        let job = Job::new(kind, input_refs, Utc::now());
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound { id })
    }

    async fn transition(&self, id: JobId, transition: &Transition) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(CoreError::NotFound { id })?;
        job.apply(transition, Utc::now())?;
        Ok(job.clone())
    }

    async fn delete(&self, id: JobId) -> Result<(), CoreError> {
        self.jobs.write().await.remove(&id);
        Ok(())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Job>, CoreError> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        // Newest first; ids are v7 so they tie-break deterministically.
        all.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_expired(&self, cutoff: Timestamp) -> Result<Vec<Job>, CoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| job.is_expired(cutoff))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.jobs.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use autodash_core::{Failure, FailureKind, JobState};

    use super::*;

    fn store() -> MemoryJobStore {
        MemoryJobStore::new(16)
    }

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn create_inserts_queued_record() {
        let store = store();
        let job = store
            .create(PipelineKind::Mask, refs(&["cat.png"]))
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Queued);

        let fetched = store.get(job.id).await.unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.input_refs, refs(&["cat.png"]));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let store = store();
        let id = uuid::Uuid::now_v7();
        assert_matches!(store.get(id).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_fails_at_capacity() {
        let store = MemoryJobStore::new(2);
        store.create(PipelineKind::Mask, refs(&["a.png"])).await.unwrap();
        store.create(PipelineKind::Mask, refs(&["b.png"])).await.unwrap();
        let err = store
            .create(PipelineKind::Mask, refs(&["c.png"]))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Capacity { limit: 2 });
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn transition_walks_the_lifecycle() {
        let store = store();
        let job = store
            .create(PipelineKind::Workflow, refs(&["in.png"]))
            .await
            .unwrap();

        let running = store.transition(job.id, &Transition::Start).await.unwrap();
        assert_eq!(running.state, JobState::Running);

        let done = store
            .transition(
                job.id,
                &Transition::Complete {
                    artifact_ref: "out.png".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.artifact_ref.as_deref(), Some("out.png"));
        assert!(done.updated_at >= job.updated_at);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected_and_harmless() {
        let store = store();
        let job = store
            .create(PipelineKind::Mask, refs(&["in.png"]))
            .await
            .unwrap();
        store.transition(job.id, &Transition::Start).await.unwrap();
        store
            .transition(
                job.id,
                &Transition::Fail {
                    failure: Failure::pipeline("model unavailable"),
                },
            )
            .await
            .unwrap();

        // Completion racing the failure loses via the guard.
        let err = store
            .transition(
                job.id,
                &Transition::Complete {
                    artifact_ref: "out.png".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { .. });

        let snapshot = store.get(job.id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.error.unwrap().kind, FailureKind::Pipeline);
        assert!(snapshot.artifact_ref.is_none());
    }

    #[tokio::test]
    async fn transition_unknown_id_is_not_found() {
        let store = store();
        let err = store
            .transition(uuid::Uuid::now_v7(), &Transition::Start)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = store();
        let job = store
            .create(PipelineKind::Rename, refs(&["face.png"]))
            .await
            .unwrap();
        store.delete(job.id).await.unwrap();
        assert_matches!(store.get(job.id).await, Err(CoreError::NotFound { .. }));
        // Second delete of the same id is a no-op, not an error.
        store.delete(job.id).await.unwrap();
    }

    #[tokio::test]
    async fn list_is_newest_first_with_pagination() {
        let store = store();
        let mut ids = Vec::new();
        for i in 0..5 {
            let job = store
                .create(PipelineKind::Mask, refs(&[&format!("img-{i}.png")]))
                .await
                .unwrap();
            ids.push(job.id);
        }

        let page = store.list(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, ids[4]);
        assert_eq!(page[1].id, ids[3]);

        let rest = store.list(10, 2).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[2].id, ids[0]);
    }

    #[tokio::test]
    async fn list_expired_returns_old_terminal_jobs_only() {
        let store = store();
        let queued = store.create(PipelineKind::Mask, refs(&["a.png"])).await.unwrap();
        let done = store.create(PipelineKind::Mask, refs(&["b.png"])).await.unwrap();
        store.transition(done.id, &Transition::Start).await.unwrap();
        store
            .transition(
                done.id,
                &Transition::Complete {
                    artifact_ref: "b_out.png".to_string(),
                },
            )
            .await
            .unwrap();

        let future_cutoff = Utc::now() + chrono::Duration::hours(1);
        let expired = store.list_expired(future_cutoff).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, done.id);

        // A stuck QUEUED job is never swept, no matter how old.
        let _ = queued;
        let past_cutoff = Utc::now() - chrono::Duration::hours(1);
        assert!(store.list_expired(past_cutoff).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_creates_yield_distinct_ids() {
        let store = Arc::new(MemoryJobStore::new(64));
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create(PipelineKind::Mask, vec![format!("img-{i}.png")])
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }
}
