//! PostgreSQL job store backend.
//!
//! The production option, selected with `STORE_BACKEND=postgres`.
//! Transitions are committed with a guarded `UPDATE ... WHERE state =
//! ANY(permitted)` so two racing writers resolve exactly like the
//! in-memory backend: one commits, the other observes
//! `InvalidTransition`.

use async_trait::async_trait;
use autodash_core::{CoreError, Failure, FailureKind, Job, JobId, PipelineKind, Timestamp, Transition};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::JobStore;

/// Column list for `jobs` queries.
const COLUMNS: &str =
    "id, kind, input_refs, state, artifact_ref, error_kind, error_message, created_at, updated_at";

/// Sqlx-backed job store over a `jobs` table.
pub struct PgJobStore {
    pool: PgPool,
    capacity: usize,
}

/// A row from the `jobs` table, prior to domain conversion.
#[derive(Debug, FromRow)]
struct JobRow {
    id: JobId,
    kind: String,
    input_refs: serde_json::Value,
    state: String,
    artifact_ref: Option<String>,
    error_kind: Option<String>,
    error_message: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let error = match (row.error_kind, row.error_message) {
            (Some(kind), Some(message)) => Some(Failure {
                kind: FailureKind::from_name(&kind)?,
                message,
            }),
            (None, None) => None,
            _ => {
                return Err(CoreError::Internal(format!(
                    "Job {} has a partial error payload",
                    row.id
                )))
            }
        };

        Ok(Job {
            id: row.id,
            kind: row.kind.parse()?,
            input_refs: serde_json::from_value(row.input_refs)
                .map_err(|e| CoreError::Internal(format!("Bad input_refs payload: {e}")))?,
            state: row.state.parse()?,
            artifact_ref: row.artifact_ref,
            error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Log and sanitize a database error. The raw error never reaches a
/// caller.
fn db_err(e: sqlx::Error) -> CoreError {
    tracing::error!(error = %e, "Job store database error");
    CoreError::Internal("job store database error".to_string())
}

impl PgJobStore {
    /// Connect, run embedded migrations, and return a store tracking at
    /// most `capacity` jobs.
    pub async fn connect(database_url: &str, capacity: usize) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(db_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Job store migration failed");
                CoreError::Internal("job store migration failed".to_string())
            })?;

        Ok(Self { pool, capacity })
    }

    async fn find_row(&self, id: JobId) -> Result<Option<JobRow>, CoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(
        &self,
        kind: PipelineKind,
        input_refs: Vec<String>,
    ) -> Result<Job, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let tracked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if tracked as usize >= self.capacity {
            return Err(CoreError::Capacity {
                limit: self.capacity,
            });
        }

        let job = Job::new(kind, input_refs, Utc::now());
        sqlx::query(
            "INSERT INTO jobs (id, kind, input_refs, state, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(job.id)
        .bind(job.kind.as_str())
        .bind(serde_json::json!(job.input_refs))
        .bind(job.state.as_str())
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        match self.find_row(id).await? {
            Some(row) => row.try_into(),
            None => Err(CoreError::NotFound { id }),
        }
    }

    async fn transition(&self, id: JobId, transition: &Transition) -> Result<Job, CoreError> {
        let target = transition.target_state();

        // States the matrix permits as predecessors of `target`.
        let permitted: Vec<String> = [
            autodash_core::JobState::Queued,
            autodash_core::JobState::Running,
        ]
        .into_iter()
        .filter(|s| s.can_advance_to(target))
        .map(|s| s.as_str().to_string())
        .collect();

        let (artifact_ref, error_kind, error_message) = match transition {
            Transition::Start => (None, None, None),
            Transition::Complete { artifact_ref } => (Some(artifact_ref.as_str()), None, None),
            Transition::Fail { failure } => (
                None,
                Some(failure.kind.as_str()),
                Some(failure.message.as_str()),
            ),
        };

        let query = format!(
            "UPDATE jobs \
             SET state = $2, artifact_ref = $3, error_kind = $4, error_message = $5, \
                 updated_at = $6 \
             WHERE id = $1 AND state = ANY($7) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(target.as_str())
            .bind(artifact_ref)
            .bind(error_kind)
            .bind(error_message)
            .bind(Utc::now())
            .bind(&permitted)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match updated {
            Some(row) => row.try_into(),
            // The guard did not match: classify as missing vs. wrong state.
            None => match self.find_row(id).await? {
                None => Err(CoreError::NotFound { id }),
                Some(row) => Err(CoreError::InvalidTransition {
                    id,
                    from: row.state.parse()?,
                    to: target,
                }),
            },
        }
    }

    async fn delete(&self, id: JobId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Job>, CoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_expired(&self, cutoff: Timestamp) -> Result<Vec<Job>, CoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE state IN ('COMPLETED', 'FAILED') AND updated_at < $1"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count(&self) -> Result<usize, CoreError> {
        let tracked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(tracked as usize)
    }
}
