use crate::error::Result;
use crate::types::ContextEntry;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

/// Upserts a context entry, setting `expires_at = now + ttl_hours`.
pub async fn set_context(
    conn: &mut PgConnection,
    key: &str,
    value: &str,
    scope: &str,
    ttl_hours: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let expires_at = now + chrono::Duration::hours(ttl_hours);
    sqlx::query(
        "INSERT INTO context_store (key, value, scope, created_at, updated_at, expires_at) \
         VALUES ($1, $2, $3, $4, $4, $5) \
         ON CONFLICT (key) DO UPDATE SET \
           value = EXCLUDED.value, scope = EXCLUDED.scope, updated_at = EXCLUDED.updated_at, \
           expires_at = EXCLUDED.expires_at",
    )
    .bind(key)
    .bind(value)
    .bind(scope)
    .bind(now)
    .bind(expires_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Returns the entry if present and not expired.
pub async fn get_context(conn: &mut PgConnection, key: &str, now: DateTime<Utc>) -> Result<Option<ContextEntry>> {
    let row: Option<ContextEntry> = sqlx::query_as(
        "SELECT key, value, scope, created_at, updated_at, expires_at FROM context_store \
         WHERE key = $1 AND expires_at > $2",
    )
    .bind(key)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

pub async fn delete_context(conn: &mut PgConnection, key: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM context_store WHERE key = $1")
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Lists non-expired keys, optionally filtered to one scope.
pub async fn list_context_keys(
    conn: &mut PgConnection,
    scope: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<ContextEntry>> {
    let rows: Vec<ContextEntry> = match scope {
        Some(scope) => {
            sqlx::query_as(
                "SELECT key, value, scope, created_at, updated_at, expires_at FROM context_store \
                 WHERE expires_at > $1 AND scope = $2 ORDER BY key",
            )
            .bind(now)
            .bind(scope)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT key, value, scope, created_at, updated_at, expires_at FROM context_store \
                 WHERE expires_at > $1 ORDER BY key",
            )
            .bind(now)
            .fetch_all(&mut *conn)
            .await?
        }
    };
    Ok(rows)
}

/// Extends `expires_at` by `additional_hours`, clamped to `now + 720h`.
pub async fn extend_context_ttl(
    conn: &mut PgConnection,
    key: &str,
    additional_hours: i64,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "UPDATE context_store SET \
           expires_at = LEAST(expires_at + ($1 * INTERVAL '1 hour'), $2 + INTERVAL '720 hours'), \
           updated_at = $2 \
         WHERE key = $3 AND expires_at > $2 \
         RETURNING expires_at",
    )
    .bind(additional_hours)
    .bind(now)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|(expires_at,)| expires_at))
}

/// Purges expired context entries, run by the TTL/verification daemon.
pub async fn purge_expired(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM context_store WHERE expires_at < $1")
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
