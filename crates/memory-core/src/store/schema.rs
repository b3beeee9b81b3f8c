use crate::error::{EngineError, Result};
use sqlx::PgConnection;

const EXTENSION_STATEMENTS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS vector",
    "CREATE EXTENSION IF NOT EXISTS ltree",
];

/// Idempotent DDL, applied in order after the extensions and the `memories`
/// table (see `init_schema`). `CREATE TABLE IF NOT EXISTS` / `ALTER TABLE
/// ... ADD COLUMN IF NOT EXISTS` rather than a versioned migration array:
/// the system this schema describes manages its own schema this way, and
/// there is no version-tracking table to invent.
///
/// The `memories` table itself isn't here — its `embedding` column needs the
/// configured dimension interpolated in, so it's built by
/// `memories_table_statement` instead.
const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS memory_edges (
        source_id UUID NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
        target_id UUID NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
        relation TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (source_id, target_id, relation)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ingestion_staging (
        job_id UUID PRIMARY KEY,
        raw_text TEXT NOT NULL,
        ttl_days BIGINT,
        status TEXT NOT NULL DEFAULT 'pending',
        error TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS context_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        scope TEXT NOT NULL DEFAULT 'session',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS primer_cache (
        cache_key TEXT PRIMARY KEY,
        summary TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS memories_category_path_gist_idx ON memories USING GIST (category_path)",
    "CREATE INDEX IF NOT EXISTS memories_lexical_search_gin_idx ON memories USING GIN (lexical_search)",
    "CREATE INDEX IF NOT EXISTS memories_verify_after_idx ON memories (verify_after) WHERE verify_after IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS context_store_expires_at_idx ON context_store (expires_at)",
];

/// The `memories` table DDL, with the embedding column's dimension
/// interpolated in — pgvector needs a fixed-dimension column both to accept
/// an HNSW index and to give `verify_embedding_dimension` anything to check.
fn memories_table_statement(expected_dim: usize) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id UUID PRIMARY KEY,
            content TEXT NOT NULL,
            embedding VECTOR({expected_dim}) NOT NULL,
            category_path LTREE NOT NULL,
            supersedes_id UUID,
            archived_at TIMESTAMPTZ,
            verify_after TIMESTAMPTZ,
            metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            lexical_search TSVECTOR GENERATED ALWAYS AS (to_tsvector('english', content)) STORED,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_accessed_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#
    )
}

const VECTOR_INDEX_STATEMENT: &str = "CREATE INDEX IF NOT EXISTS memories_embedding_hnsw_idx \
     ON memories USING hnsw (embedding vector_cosine_ops) WITH (m = 24, ef_construction = 100)";

/// Applies all schema DDL, then verifies the stored embedding dimension
/// matches `expected_dim` — a mismatch is a fatal startup error per the
/// Store Layer contract.
pub async fn init_schema(conn: &mut PgConnection, expected_dim: usize) -> Result<()> {
    for statement in EXTENSION_STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
    }

    sqlx::query(&memories_table_statement(expected_dim))
        .execute(&mut *conn)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
    }

    sqlx::query(VECTOR_INDEX_STATEMENT)
        .execute(&mut *conn)
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

    verify_embedding_dimension(conn, expected_dim).await
}

/// Introspects `pg_attribute`/`pg_class` for the `embedding` column's typmod
/// (the vector dimension) and fails startup if it diverges from the
/// configured dimension, mirroring the original's dimension-mismatch guard.
async fn verify_embedding_dimension(conn: &mut PgConnection, expected_dim: usize) -> Result<()> {
    let row: Option<(i32,)> = sqlx::query_as(
        r#"
        SELECT a.atttypmod
        FROM pg_attribute a
        JOIN pg_class c ON a.attrelid = c.oid
        WHERE c.relname = 'memories' AND a.attname = 'embedding' AND a.attnum > 0
        "#,
    )
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

    if let Some((typmod,)) = row {
        // pgvector's typmod for a VECTOR(N) column is N directly (no header
        // offset, unlike e.g. numeric). typmod <= 0 would mean unconstrained,
        // which `memories_table_statement` no longer produces.
        if typmod > 0 && typmod as usize != expected_dim {
            return Err(EngineError::EmbeddingDimMismatch {
                expected: expected_dim,
                actual: typmod as usize,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_are_nonempty_and_well_formed() {
        for statement in EXTENSION_STATEMENTS.iter().chain(STATEMENTS) {
            assert!(!statement.trim().is_empty());
        }
        assert!(VECTOR_INDEX_STATEMENT.contains("vector_cosine_ops"));
        assert!(VECTOR_INDEX_STATEMENT.contains("m = 24"));
        assert!(VECTOR_INDEX_STATEMENT.contains("ef_construction = 100"));
    }

    #[test]
    fn memories_table_statement_declares_the_configured_dimension() {
        let statement = memories_table_statement(1536);
        assert!(statement.contains("VECTOR(1536)"));
    }
}
