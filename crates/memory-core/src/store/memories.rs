use crate::error::{EngineError, Result};
use crate::types::Memory;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::PgConnection;
use uuid::Uuid;

fn row_to_memory(row: MemoryRow) -> Memory {
    Memory {
        id: row.id,
        content: row.content,
        embedding: row.embedding.to_vec(),
        category_path: row.category_path,
        supersedes_id: row.supersedes_id,
        archived_at: row.archived_at,
        verify_after: row.verify_after,
        metadata: row.metadata,
        created_at: row.created_at,
        updated_at: row.updated_at,
        last_accessed_at: row.last_accessed_at,
    }
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    id: Uuid,
    content: String,
    embedding: Vector,
    category_path: String,
    supersedes_id: Option<Uuid>,
    archived_at: Option<DateTime<Utc>>,
    verify_after: Option<DateTime<Utc>>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

/// Fetches a memory by id regardless of active/historical/archived state.
pub async fn fetch_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Memory>> {
    let row: Option<MemoryRow> = sqlx::query_as(
        "SELECT id, content, embedding, category_path::text AS category_path, supersedes_id, \
         archived_at, verify_after, metadata, created_at, updated_at, last_accessed_at \
         FROM memories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(row_to_memory))
}

/// `id` is content-addressed; existence of the row (in any state) means this
/// exact content has already been ingested under this identity.
pub async fn exists(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM memories WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// Nearest active neighbour within the same `category_path` subtree by
/// cosine similarity. Returns `(memory, similarity)`, similarity in `[0,1]`.
pub async fn nearest_active_neighbor_in_subtree(
    conn: &mut PgConnection,
    embedding: &[f32],
    category_path: &str,
) -> Result<Option<(Memory, f64)>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        memory: MemoryRow,
        similarity: f64,
    }

    let vector = Vector::from(embedding.to_vec());
    let row: Option<Row> = sqlx::query_as(
        "SELECT m.id, m.content, m.embedding, m.category_path::text AS category_path, \
         m.supersedes_id, m.archived_at, m.verify_after, m.metadata, m.created_at, \
         m.updated_at, m.last_accessed_at, 1 - (m.embedding <=> $1) AS similarity \
         FROM memories m \
         WHERE m.supersedes_id IS NULL AND m.archived_at IS NULL \
           AND m.category_path <@ $2::ltree \
         ORDER BY m.embedding <=> $1 \
         LIMIT 1",
    )
    .bind(&vector)
    .bind(category_path)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| (row_to_memory(r.memory), r.similarity)))
}

/// Inserts a fresh memory, or — on id conflict — touches only `updated_at`
/// (the batched-persistence upsert rule).
pub async fn upsert(
    conn: &mut PgConnection,
    id: Uuid,
    content: &str,
    embedding: &[f32],
    category_path: &str,
    supersedes_id: Option<Uuid>,
    verify_after: Option<DateTime<Utc>>,
    metadata: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()> {
    let vector = Vector::from(embedding.to_vec());
    sqlx::query(
        "INSERT INTO memories \
         (id, content, embedding, category_path, supersedes_id, verify_after, metadata, \
          created_at, updated_at, last_accessed_at) \
         VALUES ($1, $2, $3, $4::ltree, $5, $6, $7, $8, $8, $8) \
         ON CONFLICT (id) DO UPDATE SET updated_at = EXCLUDED.updated_at",
    )
    .bind(id)
    .bind(content)
    .bind(&vector)
    .bind(category_path)
    .bind(supersedes_id)
    .bind(verify_after)
    .bind(metadata)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Marks `old_id` as historical by pointing its `supersedes_id` at `new_id`.
pub async fn mark_superseded(
    conn: &mut PgConnection,
    old_id: Uuid,
    new_id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE memories SET supersedes_id = $1, updated_at = $2 WHERE id = $3")
        .bind(new_id)
        .bind(now)
        .bind(old_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Rewires every edge touching `old_id` onto `new_id`, then deletes the
/// edges that still reference `old_id`: insert-new-then-delete-old under the
/// `(source_id, target_id, relation)` uniqueness constraint, preserving
/// reachability without violating it.
pub async fn rewire_edges_on_supersession(
    conn: &mut PgConnection,
    old_id: Uuid,
    new_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO memory_edges (source_id, target_id, relation) \
         SELECT $2, target_id, relation FROM memory_edges WHERE source_id = $1 \
         ON CONFLICT DO NOTHING",
    )
    .bind(old_id)
    .bind(new_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO memory_edges (source_id, target_id, relation) \
         SELECT source_id, $2, relation FROM memory_edges WHERE target_id = $1 \
         ON CONFLICT DO NOTHING",
    )
    .bind(old_id)
    .bind(new_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM memory_edges WHERE source_id = $1 OR target_id = $1")
        .bind(old_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Inserts up to six `relates_to` edges from `new_id` to other active
/// memories that share `category_path` (exact text equality) or whose
/// cosine similarity exceeds `threshold`, ordered by similarity descending.
/// Resolves the spec's "disjoint top-6" ambiguity by construction: one
/// query, one ordering, not two separately ranked sets.
pub async fn insert_relates_to_edges(
    conn: &mut PgConnection,
    new_id: Uuid,
    category_path: &str,
    embedding: &[f32],
    threshold: f64,
) -> Result<()> {
    let vector = Vector::from(embedding.to_vec());
    sqlx::query(
        "INSERT INTO memory_edges (source_id, target_id, relation) \
         SELECT $1, id, 'relates_to' FROM ( \
             SELECT id, 1 - (embedding <=> $2) AS similarity \
             FROM memories \
             WHERE supersedes_id IS NULL AND archived_at IS NULL AND id != $1 \
               AND (category_path::text = $3 OR 1 - (embedding <=> $2) > $4) \
             ORDER BY similarity DESC \
             LIMIT 6 \
         ) AS candidates \
         ON CONFLICT DO NOTHING",
    )
    .bind(new_id)
    .bind(&vector)
    .bind(category_path)
    .bind(threshold)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts a `sequence_next` edge from `prev_id` to `this_id`, ignoring a
/// duplicate insert (the same effective-id pair can recur across sections).
pub async fn insert_sequence_next_edge(
    conn: &mut PgConnection,
    prev_id: Uuid,
    this_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO memory_edges (source_id, target_id, relation) \
         VALUES ($1, $2, 'sequence_next') ON CONFLICT DO NOTHING",
    )
    .bind(prev_id)
    .bind(this_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Bumps `last_accessed_at` to `now`, used both on duplicate-hit during
/// ingestion and on every row returned from retrieval.
pub async fn bump_last_accessed(conn: &mut PgConnection, id: Uuid, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE memories SET last_accessed_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Soft-archives every active memory whose `metadata.ttl_days` is set and
/// has aged past it relative to `updated_at`. Returns the number of rows
/// affected (used to decide whether to rebuild the primer).
pub async fn soft_archive_expired_ttl(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE memories SET archived_at = $1 \
         WHERE supersedes_id IS NULL AND archived_at IS NULL \
           AND metadata ? 'ttl_days' \
           AND $1 > updated_at + ((metadata->>'ttl_days')::bigint * INTERVAL '1 day')",
    )
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Hard-deletes memories archived more than 30 days ago.
pub async fn hard_delete_archived(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM memories WHERE archived_at < $1 - INTERVAL '30 days'")
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Replaces content and embedding in place, preserving id/category/edges/
/// created_at; recomputes `verify_after` from the existing `volatility_class`.
pub async fn update_memory(
    conn: &mut PgConnection,
    id: Uuid,
    content: &str,
    embedding: &[f32],
    verify_after: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    let vector = Vector::from(embedding.to_vec());
    let result = sqlx::query(
        "UPDATE memories SET content = $1, embedding = $2, verify_after = $3, updated_at = $4 \
         WHERE id = $5 AND supersedes_id IS NULL AND archived_at IS NULL",
    )
    .bind(content)
    .bind(&vector)
    .bind(verify_after)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("active memory {id} not found")));
    }
    Ok(())
}

/// Merges `patch` into the existing JSONB metadata via `||`.
pub async fn update_memory_metadata(
    conn: &mut PgConnection,
    id: Uuid,
    patch: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE memories SET metadata = metadata || $1::jsonb, updated_at = $2 \
         WHERE id = $3 AND supersedes_id IS NULL AND archived_at IS NULL",
    )
    .bind(patch)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("active memory {id} not found")));
    }
    Ok(())
}

/// Rewrites `category_path` in place. Callers must already have refused
/// this for `reference.system.primer`.
pub async fn recategorize_memory(
    conn: &mut PgConnection,
    id: Uuid,
    new_category_path: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE memories SET category_path = $1::ltree, updated_at = $2 \
         WHERE id = $3 AND supersedes_id IS NULL AND archived_at IS NULL",
    )
    .bind(new_category_path)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("active memory {id} not found")));
    }
    Ok(())
}

/// Rewrites `category_path` for every active memory under `old_prefix` to
/// the same suffix under `new_prefix`, excluding the primer.
pub async fn bulk_move_category(
    conn: &mut PgConnection,
    old_prefix: &str,
    new_prefix: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: Uuid,
        category_path: String,
    }

    let rows: Vec<Row> = sqlx::query_as(
        "SELECT id, category_path::text AS category_path FROM memories \
         WHERE supersedes_id IS NULL AND archived_at IS NULL \
           AND category_path <@ $1::ltree AND category_path::text != 'reference.system.primer'",
    )
    .bind(old_prefix)
    .fetch_all(&mut *conn)
    .await?;

    let mut moved = 0u64;
    for row in rows {
        let suffix = row
            .category_path
            .strip_prefix(old_prefix)
            .unwrap_or(&row.category_path);
        let rewritten = format!("{new_prefix}{suffix}");
        let sanitized = crate::identity::sanitize_path(&rewritten);

        sqlx::query(
            "UPDATE memories SET category_path = $1::ltree, updated_at = $2 WHERE id = $3",
        )
        .bind(&sanitized)
        .bind(now)
        .bind(row.id)
        .execute(&mut *conn)
        .await?;
        moved += 1;
    }

    Ok(moved)
}

/// Deletes the entire `sequence_next` chunk chain containing `id`: walks
/// backward and forward, deduplicates, deletes all of them in one
/// statement.
pub async fn delete_memory(conn: &mut PgConnection, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        WITH RECURSIVE backward AS (
            SELECT $1::uuid AS id
            UNION
            SELECT e.source_id FROM memory_edges e
            JOIN backward b ON e.target_id = b.id AND e.relation = 'sequence_next'
        ),
        forward AS (
            SELECT $1::uuid AS id
            UNION
            SELECT e.target_id FROM memory_edges e
            JOIN forward f ON e.source_id = f.id AND e.relation = 'sequence_next'
        ),
        chunk_chain AS (
            SELECT id FROM backward
            UNION
            SELECT id FROM forward
        )
        DELETE FROM memories m USING chunk_chain c WHERE m.id = c.id
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Ids of every active memory at an exact `category_path` — used by the
/// primer synthesizer to find prior primer records to supersede.
pub async fn active_ids_at_exact_path(conn: &mut PgConnection, category_path: &str) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM memories \
         WHERE supersedes_id IS NULL AND archived_at IS NULL AND category_path::text = $1",
    )
    .bind(category_path)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Advances `verify_after` from `volatility_class`, leaving content and
/// embedding untouched — the effect of `confirm_memory_validity`.
pub async fn set_verify_after(
    conn: &mut PgConnection,
    id: Uuid,
    verify_after: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE memories SET verify_after = $1, updated_at = $2 \
         WHERE id = $3 AND supersedes_id IS NULL AND archived_at IS NULL",
    )
    .bind(verify_after)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("active memory {id} not found")));
    }
    Ok(())
}

/// Deletes historical (superseded) memories whose `updated_at` is older than
/// `days_old` — the admin-triggered `prune_history` tool. Active records are
/// never touched regardless of age.
pub async fn prune_history(conn: &mut PgConnection, now: DateTime<Utc>, days_old: i64) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM memories \
         WHERE supersedes_id IS NOT NULL AND updated_at < $1 - ($2 * INTERVAL '1 day')",
    )
    .bind(now)
    .bind(days_old)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Active memories under `category_path` (or every active, non-primer
/// memory if absent), oldest first — the input to `export_memories`.
pub async fn export_active(conn: &mut PgConnection, category_path: Option<&str>) -> Result<Vec<Memory>> {
    let rows: Vec<MemoryRow> = match category_path {
        Some(path) => {
            sqlx::query_as(
                "SELECT id, content, embedding, category_path::text AS category_path, supersedes_id, \
                 archived_at, verify_after, metadata, created_at, updated_at, last_accessed_at \
                 FROM memories \
                 WHERE supersedes_id IS NULL AND archived_at IS NULL AND category_path <@ $1::ltree \
                 ORDER BY created_at ASC",
            )
            .bind(path)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT id, content, embedding, category_path::text AS category_path, supersedes_id, \
                 archived_at, verify_after, metadata, created_at, updated_at, last_accessed_at \
                 FROM memories \
                 WHERE supersedes_id IS NULL AND archived_at IS NULL \
                   AND category_path::text != 'reference.system.primer' \
                 ORDER BY created_at ASC",
            )
            .fetch_all(&mut *conn)
            .await?
        }
    };
    Ok(rows.into_iter().map(row_to_memory).collect())
}

/// Count of active, non-archived memories — one of the `run_diagnostics`
/// health signals.
pub async fn active_count(conn: &mut PgConnection) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM memories WHERE supersedes_id IS NULL AND archived_at IS NULL",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}
