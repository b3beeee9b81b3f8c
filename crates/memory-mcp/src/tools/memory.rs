//! `confirm_memory_validity`, `update_memory`, `update_memory_metadata`,
//! `recategorize_memory`, `bulk_move_category`.

use crate::envelope::envelope;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use memory_core::error::{EngineError, Result};
use memory_core::identity::sanitize_path;
use memory_core::primer::PRIMER_PATH;
use memory_core::store::memories;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MemoryIdRequest {
    pub memory_id: Uuid,
}

pub async fn confirm_memory_validity(
    State(state): State<AppState>,
    Json(req): Json<MemoryIdRequest>,
) -> Json<Value> {
    envelope(confirm_memory_validity_inner(&state, req).await)
}

async fn confirm_memory_validity_inner(state: &AppState, req: MemoryIdRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let memory = memories::fetch_by_id(&mut conn, req.memory_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("memory {} not found", req.memory_id)))?;

    let now = Utc::now();
    let volatility_class = memory.volatility_class();
    let next_verify_after = volatility_class.verify_after_from(now);
    memories::set_verify_after(&mut conn, req.memory_id, next_verify_after, now).await?;

    Ok(json!({
        "memory_id": req.memory_id,
        "volatility_class": volatility_class.to_string(),
        "next_verify_after": next_verify_after,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemoryRequest {
    pub id: Uuid,
    pub new_content: String,
}

pub async fn update_memory(State(state): State<AppState>, Json(req): Json<UpdateMemoryRequest>) -> Json<Value> {
    envelope(update_memory_inner(&state, req).await)
}

async fn update_memory_inner(state: &AppState, req: UpdateMemoryRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let existing = memories::fetch_by_id(&mut conn, req.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("memory {} not found", req.id)))?;

    let now = Utc::now();
    let embedding = state.gateway.embed(&req.new_content).await?;
    let verify_after = existing.volatility_class().verify_after_from(now);
    memories::update_memory(&mut conn, req.id, &req.new_content, &embedding, verify_after, now).await?;

    Ok(json!({"id": req.id}))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemoryMetadataRequest {
    pub id: Uuid,
    pub metadata: Value,
}

pub async fn update_memory_metadata(
    State(state): State<AppState>,
    Json(req): Json<UpdateMemoryMetadataRequest>,
) -> Json<Value> {
    envelope(update_memory_metadata_inner(&state, req).await)
}

async fn update_memory_metadata_inner(state: &AppState, req: UpdateMemoryMetadataRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    memories::update_memory_metadata(&mut conn, req.id, &req.metadata, Utc::now()).await?;
    Ok(json!({"id": req.id}))
}

#[derive(Debug, Deserialize)]
pub struct RecategorizeMemoryRequest {
    pub id: Uuid,
    pub new_category_path: String,
}

pub async fn recategorize_memory(
    State(state): State<AppState>,
    Json(req): Json<RecategorizeMemoryRequest>,
) -> Json<Value> {
    envelope(recategorize_memory_inner(&state, req).await)
}

async fn recategorize_memory_inner(state: &AppState, req: RecategorizeMemoryRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let existing = memories::fetch_by_id(&mut conn, req.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("memory {} not found", req.id)))?;

    if existing.category_path == PRIMER_PATH {
        return Err(EngineError::Conflict("the system primer cannot be recategorized".to_string()));
    }

    let sanitized = sanitize_path(&req.new_category_path);
    memories::recategorize_memory(&mut conn, req.id, &sanitized, Utc::now()).await?;
    Ok(json!({"id": req.id, "category_path": sanitized}))
}

#[derive(Debug, Deserialize)]
pub struct BulkMoveCategoryRequest {
    pub old_prefix: String,
    pub new_prefix: String,
}

pub async fn bulk_move_category(
    State(state): State<AppState>,
    Json(req): Json<BulkMoveCategoryRequest>,
) -> Json<Value> {
    envelope(bulk_move_category_inner(&state, req).await)
}

async fn bulk_move_category_inner(state: &AppState, req: BulkMoveCategoryRequest) -> Result<Value> {
    let old_prefix = sanitize_path(&req.old_prefix);
    let new_prefix = sanitize_path(&req.new_prefix);
    let mut conn = state.store.acquire().await?;
    let moved = memories::bulk_move_category(&mut conn, &old_prefix, &new_prefix, Utc::now()).await?;
    Ok(json!({"moved": moved}))
}
