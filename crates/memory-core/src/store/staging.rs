use crate::error::Result;
use crate::types::{IngestionJob, JobStatus};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::str::FromStr;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: Uuid,
    raw_text: String,
    ttl_days: Option<i64>,
    status: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<JobRow> for IngestionJob {
    fn from(row: JobRow) -> Self {
        IngestionJob {
            job_id: row.job_id,
            raw_text: row.raw_text,
            ttl_days: row.ttl_days,
            status: JobStatus::from_str(&row.status).unwrap_or(JobStatus::Failed),
            error: row.error,
            created_at: row.created_at,
        }
    }
}

/// Inserts a new `pending` job, returning its id.
pub async fn enqueue(conn: &mut PgConnection, raw_text: &str, ttl_days: Option<i64>) -> Result<Uuid> {
    let job_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO ingestion_staging (job_id, raw_text, ttl_days, status) \
         VALUES ($1, $2, $3, 'pending')",
    )
    .bind(job_id)
    .bind(raw_text)
    .bind(ttl_days)
    .execute(&mut *conn)
    .await?;
    Ok(job_id)
}

pub async fn fetch_status(conn: &mut PgConnection, job_id: Uuid) -> Result<Option<IngestionJob>> {
    let row: Option<JobRow> = sqlx::query_as(
        "SELECT job_id, raw_text, ttl_days, status, error, created_at \
         FROM ingestion_staging WHERE job_id = $1",
    )
    .bind(job_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(IngestionJob::from))
}

/// Atomically claims the oldest pending job under `FOR UPDATE SKIP LOCKED`,
/// guaranteeing at-most-once claim under concurrent workers.
pub async fn claim_next_pending(conn: &mut PgConnection) -> Result<Option<IngestionJob>> {
    let row: Option<JobRow> = sqlx::query_as(
        r#"
        UPDATE ingestion_staging SET status = 'processing'
        WHERE job_id = (
            SELECT job_id FROM ingestion_staging
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING job_id, raw_text, ttl_days, status, error, created_at
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(IngestionJob::from))
}

/// Resets any rows left in `processing` (a crashed worker's in-flight job)
/// back to `pending`, run once at worker startup.
pub async fn reset_orphaned_processing(conn: &mut PgConnection) -> Result<u64> {
    let result = sqlx::query("UPDATE ingestion_staging SET status = 'pending' WHERE status = 'processing'")
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn mark_complete(conn: &mut PgConnection, job_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE ingestion_staging SET status = 'complete' WHERE job_id = $1")
        .bind(job_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Records a truncated (<=1000 char) failure reason and marks the job
/// `failed`.
pub async fn mark_failed(conn: &mut PgConnection, job_id: Uuid, error: &str) -> Result<()> {
    let truncated: String = error.chars().take(1000).collect();
    sqlx::query("UPDATE ingestion_staging SET status = 'failed', error = $1 WHERE job_id = $2")
        .bind(truncated)
        .bind(job_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Deletes finished (`complete`/`failed`) staging rows older than
/// `retention_days`.
pub async fn purge_finished_older_than(conn: &mut PgConnection, now: DateTime<Utc>, retention_days: i64) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM ingestion_staging \
         WHERE status IN ('complete', 'failed') \
           AND created_at < $1 - ($2 * INTERVAL '1 day')",
    )
    .bind(now)
    .bind(retention_days)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Deletes complete/failed staging rows older than `days_old` — the
/// admin-triggered `flush_staging` tool, distinct from the daemon's
/// automatic GC pass (same predicate, caller-supplied age).
pub async fn flush_staging(conn: &mut PgConnection, now: DateTime<Utc>, days_old: i64) -> Result<u64> {
    purge_finished_older_than(conn, now, days_old).await
}

pub struct IngestionStats {
    pub pending: i64,
    pub processing: i64,
    pub complete: i64,
    pub failed: i64,
    pub oldest_pending_age_seconds: Option<i64>,
    pub last_failed: Vec<IngestionJob>,
}

pub async fn ingestion_stats(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<IngestionStats> {
    #[derive(sqlx::FromRow)]
    struct CountRow {
        status: String,
        count: i64,
    }

    let counts: Vec<CountRow> =
        sqlx::query_as("SELECT status, COUNT(*) AS count FROM ingestion_staging GROUP BY status")
            .fetch_all(&mut *conn)
            .await?;

    let mut stats = IngestionStats {
        pending: 0,
        processing: 0,
        complete: 0,
        failed: 0,
        oldest_pending_age_seconds: None,
        last_failed: Vec::new(),
    };

    for row in counts {
        match row.status.as_str() {
            "pending" => stats.pending = row.count,
            "processing" => stats.processing = row.count,
            "complete" => stats.complete = row.count,
            "failed" => stats.failed = row.count,
            _ => {}
        }
    }

    let oldest: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT created_at FROM ingestion_staging WHERE status = 'pending' ORDER BY created_at ASC LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await?;
    stats.oldest_pending_age_seconds = oldest.map(|(created_at,)| (now - created_at).num_seconds());

    let last_failed: Vec<JobRow> = sqlx::query_as(
        "SELECT job_id, raw_text, ttl_days, status, error, created_at FROM ingestion_staging \
         WHERE status = 'failed' ORDER BY created_at DESC LIMIT 5",
    )
    .fetch_all(&mut *conn)
    .await?;
    stats.last_failed = last_failed.into_iter().map(IngestionJob::from).collect();

    Ok(stats)
}
