//! `SqliteJobQueue` — durable queue.
//!
//! `claim` is a single atomic `UPDATE ... RETURNING` driven by a `WITH
//! candidates` CTE rather than a separate pick-then-update: SQLite
//! (3.35+) supports `RETURNING` on multi-row `UPDATE`s, so the
//! select-then-transition step stays one statement inside one
//! transaction, giving durable claim under concurrency without a
//! separate pick-ids-then-update-by-id-set fallback.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use ripcore_core::domain::{Job, JobId, JobStatus, JobType, NewJob};
use ripcore_core::error::Result;
use ripcore_core::port::{IdProvider, JobQueue, TimeProvider, UuidProvider};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

pub struct SqliteJobQueue {
    pool: SqlitePool,
    time: Arc<dyn TimeProvider>,
    ids: Arc<dyn IdProvider>,
}

impl SqliteJobQueue {
    /// Uses `UuidProvider` by default; see `with_id_provider` to inject a
    /// deterministic one in tests.
    pub fn new(pool: SqlitePool, time: Arc<dyn TimeProvider>) -> Self {
        Self::with_id_provider(pool, time, Arc::new(UuidProvider))
    }

    pub fn with_id_provider(
        pool: SqlitePool,
        time: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
    ) -> Self {
        Self { pool, time, ids }
    }
}

fn row_to_job(row: SqliteRow) -> Result<Job> {
    let id_str: String = row.try_get("id").map_err(map_sqlx_error)?;
    let status_str: String = row.try_get("status").map_err(map_sqlx_error)?;
    let job_type_str: String = row.try_get("job_type").map_err(map_sqlx_error)?;

    Ok(Job {
        id: JobId::parse_str(&id_str)
            .map_err(|e| map_sqlx_error(sqlx::Error::Decode(Box::new(e))))?,
        job_type: JobType::new(job_type_str),
        payload: row.try_get("payload").map_err(map_sqlx_error)?,
        payload_extra: row.try_get("payload_extra").map_err(map_sqlx_error)?,
        status: parse_status(&status_str)?,
        attempts: row.try_get("attempts").map_err(map_sqlx_error)?,
        max_attempts: row.try_get("max_attempts").map_err(map_sqlx_error)?,
        scheduled_for: row.try_get("scheduled_for").map_err(map_sqlx_error)?,
        interval_secs: row.try_get("interval_secs").map_err(map_sqlx_error)?,
        recurrent: row.try_get::<i64, _>("recurrent").map_err(map_sqlx_error)? != 0,
        created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
        updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
        locked_at: row.try_get("locked_at").map_err(map_sqlx_error)?,
        completed_at: row.try_get("completed_at").map_err(map_sqlx_error)?,
        locked_by: row.try_get("locked_by").map_err(map_sqlx_error)?,
        last_error: row.try_get("last_error").map_err(map_sqlx_error)?,
    })
}

fn parse_status(s: &str) -> Result<JobStatus> {
    Ok(match s {
        "pending" => JobStatus::Pending,
        "processing" => JobStatus::Processing,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        other => {
            return Err(map_sqlx_error(sqlx::Error::Decode(
                format!("unknown job status: {other}").into(),
            )))
        }
    })
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn insert(&self, job: NewJob) -> Result<Job> {
        if job.max_attempts < 1 {
            return Err(ripcore_core::error::AppError::Validation(
                ripcore_core::error::ValidationError::InvalidMaxAttempts,
            ));
        }
        let now = self.time.now();
        let created_at = job.created_at.unwrap_or(now);
        let id = self.ids.generate_id();
        let recurrent = job.is_recurrent();

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_type, payload, payload_extra, status,
                attempts, max_attempts, scheduled_for, interval_secs, recurrent,
                created_at, updated_at, locked_at, completed_at, locked_by, last_error
            ) VALUES (?, ?, ?, ?, 'pending', 0, ?, ?, ?, ?, ?, ?, NULL, NULL, '', '')
            "#,
        )
        .bind(id.to_string())
        .bind(job.job_type.as_str())
        .bind(&job.payload)
        .bind(&job.payload_extra)
        .bind(job.max_attempts)
        .bind(job.scheduled_for)
        .bind(job.interval_secs)
        .bind(recurrent as i64)
        .bind(created_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Job {
            id,
            job_type: job.job_type,
            payload: job.payload,
            payload_extra: job.payload_extra,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: job.max_attempts,
            scheduled_for: job.scheduled_for,
            interval_secs: job.interval_secs,
            recurrent,
            created_at,
            updated_at: now,
            locked_at: None,
            completed_at: None,
            locked_by: String::new(),
            last_error: String::new(),
        })
    }

    async fn claim(&self, limit: u32, locked_by: &str) -> Result<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let now = self.time.now();

        let rows = sqlx::query(
            r#"
            WITH candidates AS (
                SELECT id FROM jobs
                WHERE status = 'pending'
                  AND scheduled_for <= ?1
                  AND attempts < max_attempts
                ORDER BY scheduled_for ASC, id ASC
                LIMIT ?2
            )
            UPDATE jobs
            SET status = 'processing',
                attempts = attempts + 1,
                locked_at = ?1,
                locked_by = ?3,
                updated_at = ?1
            WHERE id IN (SELECT id FROM candidates)
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .bind(locked_by)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(row_to_job).collect()
    }

    async fn mark_completed(&self, id: JobId) -> Result<()> {
        let now = self.time.now();
        sqlx::query(
            "UPDATE jobs SET status = 'completed', completed_at = ?, updated_at = ? WHERE id = ? AND status = 'processing'",
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn mark_recurrent_completed(&self, id: JobId, next: NewJob) -> Result<Job> {
        let now = self.time.now();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            "UPDATE jobs SET status = 'completed', completed_at = ?, updated_at = ? WHERE id = ? AND status = 'processing'",
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let next_id = self.ids.generate_id();
        let recurrent = next.is_recurrent();
        // §4.5.1: the successor's `created_at` preserves the original
        // job's creation time for audit, not the re-enqueue time.
        let next_created_at = next.created_at.unwrap_or(now);

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_type, payload, payload_extra, status,
                attempts, max_attempts, scheduled_for, interval_secs, recurrent,
                created_at, updated_at, locked_at, completed_at, locked_by, last_error
            ) VALUES (?, ?, ?, ?, 'pending', 0, ?, ?, ?, ?, ?, ?, NULL, NULL, '', '')
            "#,
        )
        .bind(next_id.to_string())
        .bind(next.job_type.as_str())
        .bind(&next.payload)
        .bind(&next.payload_extra)
        .bind(next.max_attempts)
        .bind(next.scheduled_for)
        .bind(next.interval_secs)
        .bind(recurrent as i64)
        .bind(next_created_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(Job {
            id: next_id,
            job_type: next.job_type,
            payload: next.payload,
            payload_extra: next.payload_extra,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: next.max_attempts,
            scheduled_for: next.scheduled_for,
            interval_secs: next.interval_secs,
            recurrent,
            created_at: next_created_at,
            updated_at: now,
            locked_at: None,
            completed_at: None,
            locked_by: String::new(),
            last_error: String::new(),
        })
    }

    async fn mark_failed(&self, id: JobId, error_message: &str) -> Result<()> {
        let now = self.time.now();
        // `processing -> pending` when retries remain, else `processing -> failed`.
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts < max_attempts THEN 'pending' ELSE 'failed' END,
                last_error = ?,
                updated_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(error_message)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list(&self, limit: u32) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(row_to_job).collect()
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
