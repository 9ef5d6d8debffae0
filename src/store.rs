//! Job persistence and the atomic dispatch protocol. Grounded on the
//! transactional `SELECT ... FOR UPDATE SKIP LOCKED` claim pattern from the
//! `OcrQueueService` example (`readur`'s `ocr_queue.rs`), adapted to a single
//! `jobs` table with no separate queue structure — the store *is* the queue.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{JobRow, JobStatus, JobSummaryRow};

const STUCK_JOB_THRESHOLD_MINUTES: i64 = 10;
const CLAIM_RETRY_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Conflict,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_job(
        &self,
        document_type: &str,
        email: &str,
        callback_webhook: Option<&str>,
        file_data: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO jobs (id, status, document_type, email, callback_webhook, file_data, \
             file_name, mime_type, created_at, updated_at) \
             VALUES ($1, 'PENDING', $2, $3, $4, $5, $6, $7, now(), now())",
        )
        .bind(id)
        .bind(document_type)
        .bind(email)
        .bind(callback_webhook)
        .bind(file_data)
        .bind(file_name)
        .bind(mime_type)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Option<JobRow>, sqlx::Error> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<JobSummaryRow>, i64), sqlx::Error> {
        let rows = if let Some(status) = status {
            sqlx::query_as::<_, JobSummaryRow>(
                "SELECT id, status, document_type, email, file_name, mime_type, \
                 length(file_data) AS file_size_bytes, error_message, created_at, \
                 updated_at, processed_at FROM jobs WHERE status = $1 \
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, JobSummaryRow>(
                "SELECT id, status, document_type, email, file_name, mime_type, \
                 length(file_data) AS file_size_bytes, error_message, created_at, \
                 updated_at, processed_at FROM jobs \
                 ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
        };

        let total: i64 = if let Some(status) = status {
            sqlx::query_scalar("SELECT count(*) FROM jobs WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT count(*) FROM jobs")
                .fetch_one(&self.pool)
                .await?
        };

        Ok((rows, total))
    }

    pub async fn status_counts(&self) -> Result<StatusCounts, sqlx::Error> {
        let rows = sqlx::query("SELECT status, count(*) AS n FROM jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            match status.parse::<JobStatus>() {
                Ok(JobStatus::Pending) => counts.pending = n,
                Ok(JobStatus::Processing) => counts.processing = n,
                Ok(JobStatus::Completed) => counts.completed = n,
                Ok(JobStatus::Failed) => counts.failed = n,
                Err(_) => {}
            }
        }
        Ok(counts)
    }

    pub async fn created_last_hour(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT count(*) FROM jobs WHERE created_at > now() - interval '1 hour'")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn avg_processing_time_ms(&self) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT avg(extract(epoch FROM (processed_at - created_at)) * 1000) FROM (
                SELECT created_at, processed_at FROM jobs
                WHERE status = 'COMPLETED' AND processed_at IS NOT NULL
                ORDER BY processed_at DESC LIMIT 100
             ) recent",
        )
        .fetch_one(&self.pool)
        .await
    }

    pub async fn stuck_job_ids(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM jobs WHERE status = 'PROCESSING' \
             AND updated_at < now() - make_interval(mins => $1)",
        )
        .bind(STUCK_JOB_THRESHOLD_MINUTES as f64)
        .fetch_all(&self.pool)
        .await
    }

    /// Atomically claims the oldest pending job, marking it PROCESSING.
    /// Retries a handful of times on serialization/lock-wait contention
    /// before giving up for this poll cycle, matching the queue example's
    /// bounded retry loop rather than retrying forever.
    pub async fn claim_oldest_pending(&self) -> Result<Option<JobRow>, sqlx::Error> {
        for attempt in 0..CLAIM_RETRY_ATTEMPTS {
            let mut tx = self.pool.begin().await?;

            let candidate = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM jobs WHERE status = 'PENDING' \
                 ORDER BY created_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
            )
            .fetch_optional(&mut *tx)
            .await?;

            let Some(id) = candidate else {
                tx.commit().await?;
                return Ok(None);
            };

            let rows_affected = sqlx::query(
                "UPDATE jobs SET status = 'PROCESSING', updated_at = now() \
                 WHERE id = $1 AND status = 'PENDING'",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rows_affected == 0 {
                // Lost the race to another scheduler between the select and
                // the update; retry against a fresh snapshot.
                tx.rollback().await?;
                tracing::debug!(attempt, %id, "claim lost race, retrying");
                continue;
            }

            let job = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

            tx.commit().await?;
            return Ok(Some(job));
        }

        Ok(None)
    }

    pub async fn finalize_completed(&self, id: Uuid, ocr_result: &str) -> Result<bool, sqlx::Error> {
        let rows_affected = sqlx::query(
            "UPDATE jobs SET status = 'COMPLETED', ocr_result = $2, error_message = NULL, \
             processed_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(ocr_result)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows_affected > 0)
    }

    pub async fn finalize_failed(&self, id: Uuid, error_message: &str) -> Result<bool, sqlx::Error> {
        let rows_affected = sqlx::query(
            "UPDATE jobs SET status = 'FAILED', error_message = $2, ocr_result = NULL, \
             processed_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows_affected > 0)
    }

    pub async fn reset_to_pending(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let rows_affected = sqlx::query(
            "UPDATE jobs SET status = 'PENDING', error_message = NULL, processed_at = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows_affected > 0)
    }

    /// FAILED is a terminal status under the `jobs_failed_has_error` CHECK
    /// constraint, which requires `processed_at` to be set alongside it —
    /// mirrored here so an admin-triggered FAILED transition doesn't violate
    /// the constraint the way the worker's own `finalize_failed` already
    /// honors.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let rows_affected = if status == JobStatus::Failed {
            sqlx::query(
                "UPDATE jobs SET status = $2, error_message = $3, processed_at = now(), \
                 updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(status.as_str())
            .bind(error_message)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                "UPDATE jobs SET status = $2, error_message = $3, updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(status.as_str())
            .bind(error_message)
            .execute(&self.pool)
            .await?
            .rows_affected()
        };
        Ok(rows_affected > 0)
    }

    pub async fn delete_job(&self, id: Uuid, force: bool) -> Result<DeleteOutcome, sqlx::Error> {
        let Some(row) = self.get_job(id).await? else {
            return Ok(DeleteOutcome::NotFound);
        };

        if row.status() == JobStatus::Processing && !force {
            return Ok(DeleteOutcome::Conflict);
        }

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteOutcome::Deleted)
    }

    pub fn stuck_threshold() -> Duration {
        Duration::minutes(STUCK_JOB_THRESHOLD_MINUTES)
    }
}

pub fn is_stuck(status: JobStatus, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    status == JobStatus::Processing && now - updated_at > Store::stuck_threshold()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuck_detection_requires_processing_status() {
        let now = Utc::now();
        let stale = now - Duration::minutes(30);
        assert!(is_stuck(JobStatus::Processing, stale, now));
        assert!(!is_stuck(JobStatus::Pending, stale, now));
        assert!(!is_stuck(JobStatus::Completed, stale, now));
    }

    #[test]
    fn stuck_detection_respects_threshold() {
        let now = Utc::now();
        let recent = now - Duration::minutes(2);
        assert!(!is_stuck(JobStatus::Processing, recent, now));
    }
}
