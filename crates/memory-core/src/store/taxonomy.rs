use crate::error::Result;
use sqlx::PgConnection;

/// Supplementary seed paths injected alongside the five L1 roots when no
/// active memories exist yet, so the segmenter always has something to
/// anchor to.
const SUPPLEMENTARY_SEED_PATHS: &[&str] = &[
    "profile.identity",
    "projects.active",
    "organizations.employer",
    "concepts.preferences",
    "reference.unknown",
];

const L1_ROOTS: &[&str] = &["profile", "projects", "organizations", "concepts", "reference"];

/// Top `limit` active `category_path`s by descending record count, for
/// priming the segmenter's taxonomy-reuse prompt. Falls back to the five L1
/// roots plus a fixed supplementary list when the store is empty.
pub async fn top_category_paths(conn: &mut PgConnection, limit: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT category_path::text FROM memories \
         WHERE supersedes_id IS NULL AND archived_at IS NULL \
         GROUP BY category_path ORDER BY COUNT(*) DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        let mut seed: Vec<String> = L1_ROOTS.iter().map(|s| s.to_string()).collect();
        seed.extend(SUPPLEMENTARY_SEED_PATHS.iter().map(|s| s.to_string()));
        Ok(seed)
    } else {
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }
}

/// Flat `(path, count)` rows for every active, non-primer category — the
/// input to both `list_categories` and the taxonomy tree renderer.
pub async fn category_counts(conn: &mut PgConnection) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT category_path::text, COUNT(*) FROM memories \
         WHERE supersedes_id IS NULL AND archived_at IS NULL \
           AND category_path::text != 'reference.system.primer' \
         GROUP BY category_path ORDER BY category_path",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// `(path, content)` rows under a given ltree path (supports `*`-suffixed
/// lquery patterns for subtree exploration).
pub async fn fetch_under_lquery(conn: &mut PgConnection, lquery: &str) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT category_path::text, content FROM memories \
         WHERE supersedes_id IS NULL AND archived_at IS NULL \
           AND category_path ~ $1::lquery \
         ORDER BY category_path, created_at",
    )
    .bind(lquery)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Every active memory under the `profile` L1 root, ordered by path then
/// creation time — the input to the user-profile briefing summarizer.
pub async fn profile_chunks(conn: &mut PgConnection) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT content FROM memories \
         WHERE supersedes_id IS NULL AND archived_at IS NULL \
           AND category_path <@ 'profile'::ltree \
         ORDER BY category_path, created_at",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}
