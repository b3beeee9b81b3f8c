//! Destructive/operational tools only mounted on the admin port:
//! `delete_memory`, `prune_history`, `export_memories`, `run_diagnostics`,
//! `get_ingestion_stats`, `flush_staging`.

use crate::envelope::envelope;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use memory_core::error::Result;
use memory_core::store::{memories, staging, taxonomy};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MemoryIdRequest {
    pub memory_id: Uuid,
}

pub async fn delete_memory(State(state): State<AppState>, Json(req): Json<MemoryIdRequest>) -> Json<Value> {
    envelope(delete_memory_inner(&state, req).await)
}

async fn delete_memory_inner(state: &AppState, req: MemoryIdRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let deleted = memories::delete_memory(&mut conn, req.memory_id).await?;
    Ok(json!({"deleted": deleted}))
}

#[derive(Debug, Deserialize)]
pub struct PruneHistoryRequest {
    pub days_old: i64,
}

pub async fn prune_history(State(state): State<AppState>, Json(req): Json<PruneHistoryRequest>) -> Json<Value> {
    envelope(prune_history_inner(&state, req).await)
}

async fn prune_history_inner(state: &AppState, req: PruneHistoryRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let pruned = memories::prune_history(&mut conn, Utc::now(), req.days_old).await?;
    Ok(json!({"pruned": pruned}))
}

#[derive(Debug, Deserialize, Default)]
pub struct ExportMemoriesRequest {
    pub category_path: Option<String>,
}

pub async fn export_memories(State(state): State<AppState>, Json(req): Json<ExportMemoriesRequest>) -> Json<Value> {
    envelope(export_memories_inner(&state, req).await)
}

async fn export_memories_inner(state: &AppState, req: ExportMemoriesRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let exported = memories::export_active(&mut conn, req.category_path.as_deref()).await?;
    let memories: Vec<Value> = exported
        .into_iter()
        .map(|m| {
            json!({
                "id": m.id,
                "content": m.content,
                "category_path": m.category_path,
                "metadata": m.metadata,
                "created_at": m.created_at,
                "updated_at": m.updated_at,
            })
        })
        .collect();
    Ok(json!({"memories": memories}))
}

pub async fn run_diagnostics(State(state): State<AppState>) -> Json<Value> {
    envelope(run_diagnostics_inner(&state).await)
}

async fn run_diagnostics_inner(state: &AppState) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let now = Utc::now();

    let active_memories = memories::active_count(&mut conn).await?;
    let ingestion = staging::ingestion_stats(&mut conn, now).await?;
    let categories = taxonomy::category_counts(&mut conn).await?;

    Ok(json!({
        "store_reachable": true,
        "active_memories": active_memories,
        "distinct_categories": categories.len(),
        "ingestion_pending": ingestion.pending,
        "ingestion_processing": ingestion.processing,
        "ingestion_failed": ingestion.failed,
        "oldest_pending_age_seconds": ingestion.oldest_pending_age_seconds,
    }))
}

pub async fn get_ingestion_stats(State(state): State<AppState>) -> Json<Value> {
    envelope(get_ingestion_stats_inner(&state).await)
}

async fn get_ingestion_stats_inner(state: &AppState) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let stats = staging::ingestion_stats(&mut conn, Utc::now()).await?;
    let last_failed: Vec<Value> = stats
        .last_failed
        .into_iter()
        .map(|j| json!({"job_id": j.job_id, "error": j.error, "created_at": j.created_at}))
        .collect();

    Ok(json!({
        "pending": stats.pending,
        "processing": stats.processing,
        "complete": stats.complete,
        "failed": stats.failed,
        "oldest_pending_age_seconds": stats.oldest_pending_age_seconds,
        "last_failed": last_failed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FlushStagingRequest {
    #[serde(default = "default_flush_days")]
    pub days_old: i64,
}

fn default_flush_days() -> i64 {
    7
}

pub async fn flush_staging(State(state): State<AppState>, Json(req): Json<FlushStagingRequest>) -> Json<Value> {
    envelope(flush_staging_inner(&state, req).await)
}

async fn flush_staging_inner(state: &AppState, req: FlushStagingRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let flushed = staging::flush_staging(&mut conn, Utc::now(), req.days_old).await?;
    Ok(json!({"flushed": flushed}))
}
