//! `search_memory`, `list_categories`, `explore_taxonomy`, `fetch_document`,
//! `trace_history`.

use crate::envelope::envelope;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use memory_core::error::Result;
use memory_core::retrieval;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SearchMemoryRequest {
    pub query: String,
    #[serde(default)]
    pub category_path: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn search_memory(State(state): State<AppState>, Json(req): Json<SearchMemoryRequest>) -> Json<Value> {
    envelope(search_memory_inner(&state, req).await)
}

async fn search_memory_inner(state: &AppState, req: SearchMemoryRequest) -> Result<Value> {
    let hits = retrieval::search_memory(
        &state.store,
        state.gateway.as_ref(),
        &state.config,
        &req.query,
        req.category_path.as_deref(),
        req.limit,
    )
    .await?;

    let results: Vec<Value> = hits
        .into_iter()
        .map(|h| {
            json!({
                "id": h.id,
                "content": h.content,
                "category_path": h.category_path,
                "rrf_score": h.rrf_score,
                "semantic_score": h.semantic_score,
                "keyword_score": h.keyword_score,
                "metadata": h.metadata,
                "created_at": h.created_at,
                "updated_at": h.updated_at,
                "expired": h.expired,
            })
        })
        .collect();

    Ok(json!({"results": results}))
}

pub async fn list_categories(State(state): State<AppState>) -> Json<Value> {
    envelope(list_categories_inner(&state).await)
}

async fn list_categories_inner(state: &AppState) -> Result<Value> {
    let rows = retrieval::list_categories(&state.store).await?;
    let categories: Vec<Value> = rows
        .into_iter()
        .map(|c| json!({"category": c.category, "count": c.count}))
        .collect();
    Ok(json!({"categories": categories}))
}

#[derive(Debug, Deserialize)]
pub struct ExploreTaxonomyRequest {
    pub path: String,
}

pub async fn explore_taxonomy(State(state): State<AppState>, Json(req): Json<ExploreTaxonomyRequest>) -> Json<Value> {
    envelope(explore_taxonomy_inner(&state, req).await)
}

async fn explore_taxonomy_inner(state: &AppState, req: ExploreTaxonomyRequest) -> Result<Value> {
    let view = retrieval::explore_taxonomy(&state.store, &req.path).await?;
    let categories: Vec<Value> = view
        .categories
        .into_iter()
        .map(|c| json!({"category": c.category, "count": c.count}))
        .collect();
    Ok(json!({
        "path": view.path,
        "tree": view.tree,
        "total": view.total,
        "categories": categories,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MemoryIdRequest {
    pub memory_id: Uuid,
}

pub async fn fetch_document(State(state): State<AppState>, Json(req): Json<MemoryIdRequest>) -> Json<Value> {
    envelope(fetch_document_inner(&state, req).await)
}

async fn fetch_document_inner(state: &AppState, req: MemoryIdRequest) -> Result<Value> {
    let doc = retrieval::fetch_document(&state.store, req.memory_id).await?;
    Ok(json!({
        "memory_id": doc.memory_id,
        "chunk_count": doc.chunk_count,
        "category_path": doc.category_path,
        "content": doc.content,
    }))
}

pub async fn trace_history(State(state): State<AppState>, Json(req): Json<MemoryIdRequest>) -> Json<Value> {
    envelope(trace_history_inner(&state, req).await)
}

async fn trace_history_inner(state: &AppState, req: MemoryIdRequest) -> Result<Value> {
    let chain = retrieval::trace_history(&state.store, req.memory_id).await?;
    let entries: Vec<Value> = chain
        .chain
        .into_iter()
        .map(|e| {
            json!({
                "id": e.id,
                "content": e.content,
                "supersedes_id": e.supersedes_id,
                "created_at": e.created_at,
                "updated_at": e.updated_at,
            })
        })
        .collect();
    Ok(json!({
        "memory_id": chain.memory_id,
        "version_count": chain.version_count,
        "chain": entries,
    }))
}
