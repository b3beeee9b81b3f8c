use crate::error::Result;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::PgConnection;
use uuid::Uuid;

/// One row of the hybrid RRF search before neighbour-stitching and sorting.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HybridSearchRow {
    pub id: Uuid,
    pub content: String,
    pub category_path: String,
    pub supersedes_id: Option<Uuid>,
    pub verify_after: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub semantic_score: f64,
    pub keyword_score: f64,
    pub rrf_score: f64,
}

/// Hybrid semantic + keyword retrieval, combined via Reciprocal Rank Fusion
/// (`1/(60+semantic_rank) + 1/(60+keyword_rank)`, 0 for the missing side).
/// `category_path` narrows both legs to the given ltree subtree when present.
pub async fn hybrid_search(
    conn: &mut PgConnection,
    query_embedding: &[f32],
    query_text: &str,
    category_path: Option<&str>,
    limit: i64,
) -> Result<Vec<HybridSearchRow>> {
    let vector = Vector::from(query_embedding.to_vec());
    let where_clause = if category_path.is_some() {
        "m.supersedes_id IS NULL AND m.archived_at IS NULL AND m.category_path <@ $4::ltree"
    } else {
        "m.supersedes_id IS NULL AND m.archived_at IS NULL"
    };

    let sql = format!(
        "WITH semantic_search AS ( \
            SELECT id, 1 - (embedding <=> $1) AS semantic_score, \
                   row_number() OVER (ORDER BY embedding <=> $1) AS semantic_rank \
            FROM memories m WHERE {where_clause} \
            ORDER BY embedding <=> $1 LIMIT $2 \
        ), \
        keyword_search AS ( \
            SELECT id, ts_rank_cd(lexical_search, websearch_to_tsquery('english', $3)) AS keyword_score, \
                   row_number() OVER (ORDER BY ts_rank_cd(lexical_search, websearch_to_tsquery('english', $3)) DESC) AS keyword_rank \
            FROM memories m WHERE {where_clause} AND lexical_search @@ websearch_to_tsquery('english', $3) \
            ORDER BY keyword_score DESC LIMIT $2 \
        ) \
        SELECT m.id, m.content, m.category_path::text AS category_path, m.supersedes_id, \
               m.verify_after, m.metadata, m.created_at, m.updated_at, \
               COALESCE(s.semantic_score, 0.0) AS semantic_score, \
               COALESCE(k.keyword_score, 0.0) AS keyword_score, \
               COALESCE(1.0 / (60 + s.semantic_rank), 0.0) + COALESCE(1.0 / (60 + k.keyword_rank), 0.0) AS rrf_score \
        FROM memories m \
        LEFT JOIN semantic_search s ON m.id = s.id \
        LEFT JOIN keyword_search k ON m.id = k.id \
        WHERE s.id IS NOT NULL OR k.id IS NOT NULL \
        ORDER BY rrf_score DESC LIMIT $2"
    );

    let mut q = sqlx::query_as::<_, HybridSearchRow>(&sql)
        .bind(&vector)
        .bind(limit)
        .bind(query_text);
    if let Some(path) = category_path {
        q = q.bind(path);
    }

    Ok(q.fetch_all(&mut *conn).await?)
}

/// Content of the single active predecessor chunk linked to `id` by
/// `sequence_next`, used to prepend local context to a search result.
pub async fn prev_sequence_content(conn: &mut PgConnection, id: Uuid) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT prev.content FROM memory_edges e \
         JOIN memories prev ON prev.id = e.source_id \
           AND prev.supersedes_id IS NULL AND prev.archived_at IS NULL \
         WHERE e.target_id = $1 AND e.relation = 'sequence_next' LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|(c,)| c))
}

/// Content of the single active successor chunk linked to `id` by
/// `sequence_next`, used to append local context to a search result.
pub async fn next_sequence_content(conn: &mut PgConnection, id: Uuid) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT nxt.content FROM memory_edges e \
         JOIN memories nxt ON nxt.id = e.target_id \
           AND nxt.supersedes_id IS NULL AND nxt.archived_at IS NULL \
         WHERE e.source_id = $1 AND e.relation = 'sequence_next' LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|(c,)| c))
}

/// One chunk of a reconstructed document, in traversal order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub content: String,
    pub category_path: String,
    pub created_at: DateTime<Utc>,
}

/// Breadth/depth-bounded traversal of `sequence_next` edges backward and
/// forward from `id` (depth <= 200, active-only), deduplicated, ordered by
/// signed depth (backward negative), reconstructing the full chunk chain.
pub async fn document_chunks(conn: &mut PgConnection, id: Uuid) -> Result<Vec<DocumentChunk>> {
    let rows: Vec<DocumentChunk> = sqlx::query_as(
        r#"
        WITH RECURSIVE backward AS (
            SELECT m.id, m.content, m.category_path::text AS category_path, m.created_at, 0 AS depth
            FROM memories m
            WHERE m.id = $1 AND m.supersedes_id IS NULL AND m.archived_at IS NULL
          UNION ALL
            SELECT m.id, m.content, m.category_path::text AS category_path, m.created_at, b.depth + 1
            FROM backward b
            JOIN memory_edges e ON e.target_id = b.id AND e.relation = 'sequence_next'
            JOIN memories m ON m.id = e.source_id
            WHERE m.supersedes_id IS NULL AND m.archived_at IS NULL AND b.depth < 200
        ),
        forward AS (
            SELECT m.id, m.content, m.category_path::text AS category_path, m.created_at, 0 AS depth
            FROM memories m
            WHERE m.id = $1 AND m.supersedes_id IS NULL AND m.archived_at IS NULL
          UNION ALL
            SELECT m.id, m.content, m.category_path::text AS category_path, m.created_at, f.depth + 1
            FROM forward f
            JOIN memory_edges e ON e.source_id = f.id AND e.relation = 'sequence_next'
            JOIN memories m ON m.id = e.target_id
            WHERE m.supersedes_id IS NULL AND m.archived_at IS NULL AND f.depth < 200
        ),
        combined AS (
            SELECT id, content, category_path, created_at, -depth AS sort_key FROM backward
            UNION ALL
            SELECT id, content, category_path, created_at, depth AS sort_key FROM forward WHERE depth > 0
        ),
        deduped AS (
            SELECT DISTINCT ON (id) id, content, category_path, created_at, sort_key
            FROM combined
            ORDER BY id, sort_key
        )
        SELECT id, content, category_path, created_at
        FROM deduped
        ORDER BY sort_key
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// One version in a supersession chain, as returned by `trace_history`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub content: String,
    pub supersedes_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub generation: i32,
}

/// Breadth-first traversal over `supersedes_id` back-pointers (depth <= 100),
/// ordered by `created_at` ascending — the full chronological chain including
/// the target, regardless of whether the target itself is active.
pub async fn trace_history(conn: &mut PgConnection, id: Uuid) -> Result<Vec<HistoryEntry>> {
    let rows: Vec<HistoryEntry> = sqlx::query_as(
        r#"
        WITH RECURSIVE history AS (
            SELECT id, content, supersedes_id, created_at, updated_at, 0 AS generation
            FROM memories
            WHERE id = $1
          UNION ALL
            SELECT m.id, m.content, m.supersedes_id, m.created_at, m.updated_at, h.generation + 1
            FROM memories m
            JOIN history h ON m.supersedes_id = h.id
            WHERE h.generation < 100
        )
        SELECT id, content, supersedes_id, created_at, updated_at, generation
        FROM history
        ORDER BY created_at ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Active, non-archived memories whose `verify_after` has already passed —
/// surfaced at read time by `initialize_context`, never enforced at write
/// time. Capped to the 3 most overdue, mirroring the primer's verification
/// block.
pub async fn overdue_verifications(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<(Uuid, String, String, DateTime<Utc>, serde_json::Value)>> {
    let rows: Vec<(Uuid, String, String, DateTime<Utc>, serde_json::Value)> = sqlx::query_as(
        "SELECT id, content, category_path::text, verify_after, metadata FROM memories \
         WHERE supersedes_id IS NULL AND archived_at IS NULL AND verify_after < $1 \
         ORDER BY verify_after ASC LIMIT $2",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Every active memory under `reference.system.*`, ordered oldest first —
/// the input to `initialize_context`'s `results` field (the primer plus any
/// other system-root records).
pub async fn system_records(conn: &mut PgConnection) -> Result<Vec<(Uuid, String, String, DateTime<Utc>, DateTime<Utc>, serde_json::Value)>> {
    let rows: Vec<(Uuid, String, String, DateTime<Utc>, DateTime<Utc>, serde_json::Value)> = sqlx::query_as(
        "SELECT id, content, category_path::text, created_at, updated_at, metadata FROM memories \
         WHERE category_path ~ 'reference.system.*'::lquery \
           AND supersedes_id IS NULL AND archived_at IS NULL \
         ORDER BY created_at ASC",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_search_row_carries_both_component_scores() {
        let row = HybridSearchRow {
            id: Uuid::nil(),
            content: "x".to_string(),
            category_path: "reference.unknown".to_string(),
            supersedes_id: None,
            verify_after: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            semantic_score: 0.5,
            keyword_score: 0.2,
            rrf_score: 0.03,
        };
        assert!(row.semantic_score > 0.0 && row.keyword_score > 0.0);
    }
}
