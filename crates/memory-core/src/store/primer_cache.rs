use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

const CACHE_KEY: &str = "user_context";

/// Returns the cached user-briefing prose, if one exists.
pub async fn get_cached_user_context(conn: &mut PgConnection) -> Result<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT summary FROM primer_cache WHERE cache_key = $1")
            .bind(CACHE_KEY)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.map(|(summary,)| summary))
}

pub async fn set_cached_user_context(conn: &mut PgConnection, summary: &str, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "INSERT INTO primer_cache (cache_key, summary, updated_at) VALUES ($1, $2, $3) \
         ON CONFLICT (cache_key) DO UPDATE SET summary = EXCLUDED.summary, updated_at = EXCLUDED.updated_at",
    )
    .bind(CACHE_KEY)
    .bind(summary)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
