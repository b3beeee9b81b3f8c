//! `initialize_context`, `memorize_context`, `check_ingestion_status`, and
//! the ephemeral context-store tools (`set_context` / `get_context` /
//! `delete_context` / `list_context_keys` / `extend_context_ttl`).

use crate::envelope::envelope;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use memory_core::error::{EngineError, Result};
use memory_core::store::{context_store, retrieval as store_retrieval, staging};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

const OVERDUE_VERIFICATION_LIMIT: i64 = 3;

pub async fn initialize_context(State(state): State<AppState>) -> Json<Value> {
    envelope(initialize_context_inner(&state).await)
}

async fn initialize_context_inner(state: &AppState) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let now = Utc::now();

    let system_records = store_retrieval::system_records(&mut conn).await?;
    let results: Vec<Value> = system_records
        .into_iter()
        .map(|(id, content, category_path, created_at, updated_at, metadata)| {
            json!({
                "id": id,
                "content": content,
                "category_path": category_path,
                "created_at": created_at,
                "updated_at": updated_at,
                "metadata": metadata,
            })
        })
        .collect();

    let overdue = store_retrieval::overdue_verifications(&mut conn, now, OVERDUE_VERIFICATION_LIMIT).await?;
    let verification_required: Vec<Value> = overdue
        .iter()
        .map(|(id, _content, category_path, verify_after, _metadata)| {
            json!({"id": id, "category_path": category_path, "verify_after": verify_after})
        })
        .collect();

    let verification_block = if overdue.is_empty() {
        "No records require verification.".to_string()
    } else {
        let lines: Vec<String> = overdue
            .iter()
            .map(|(id, _content, category_path, verify_after, _metadata)| {
                format!("- {category_path} ({id}) expired {verify_after}")
            })
            .collect();
        format!(
            "{} record(s) are overdue for confirm_memory_validity:\n{}",
            overdue.len(),
            lines.join("\n")
        )
    };

    Ok(json!({
        "results": results,
        "verification_required": verification_required,
        "verification_block": verification_block,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MemorizeContextRequest {
    pub text: String,
    pub ttl_days: Option<i64>,
}

pub async fn memorize_context(State(state): State<AppState>, Json(req): Json<MemorizeContextRequest>) -> Json<Value> {
    envelope(memorize_context_inner(&state, req).await)
}

async fn memorize_context_inner(state: &AppState, req: MemorizeContextRequest) -> Result<Value> {
    if req.text.chars().count() > state.config.max_memorize_text_length {
        return Err(EngineError::InvalidInput(format!(
            "text exceeds MAX_MEMORIZE_TEXT_LENGTH ({})",
            state.config.max_memorize_text_length
        )));
    }

    let mut conn = state.store.acquire().await?;
    let job_id = staging::enqueue(&mut conn, &req.text, req.ttl_days).await?;
    Ok(json!({"job_id": job_id}))
}

#[derive(Debug, Deserialize)]
pub struct CheckIngestionStatusRequest {
    pub job_id: Uuid,
}

pub async fn check_ingestion_status(
    State(state): State<AppState>,
    Json(req): Json<CheckIngestionStatusRequest>,
) -> Json<Value> {
    envelope(check_ingestion_status_inner(&state, req).await)
}

async fn check_ingestion_status_inner(state: &AppState, req: CheckIngestionStatusRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let job = staging::fetch_status(&mut conn, req.job_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("ingestion job {} not found", req.job_id)))?;

    Ok(json!({
        "status": job.status.to_string(),
        "error": job.error,
        "created_at": job.created_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetContextRequest {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub ttl_hours: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

pub async fn set_context(State(state): State<AppState>, Json(req): Json<SetContextRequest>) -> Json<Value> {
    envelope(set_context_inner(&state, req).await)
}

async fn set_context_inner(state: &AppState, req: SetContextRequest) -> Result<Value> {
    validate_context_key(&req.key, state.config.context_max_key_length)?;
    if req.value.chars().count() > state.config.context_max_value_length {
        return Err(EngineError::InvalidInput(format!(
            "value exceeds CONTEXT_MAX_VALUE_LENGTH ({})",
            state.config.context_max_value_length
        )));
    }

    let ttl_hours = req.ttl_hours.unwrap_or(state.config.context_default_ttl_hours).clamp(1, 720);
    let scope = req.scope.unwrap_or_else(|| "session".to_string());

    let mut conn = state.store.acquire().await?;
    context_store::set_context(&mut conn, &req.key, &req.value, &scope, ttl_hours, Utc::now()).await?;
    Ok(json!({"key": req.key}))
}

#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    pub key: String,
}

pub async fn get_context(State(state): State<AppState>, Json(req): Json<KeyRequest>) -> Json<Value> {
    envelope(get_context_inner(&state, req).await)
}

async fn get_context_inner(state: &AppState, req: KeyRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let entry = context_store::get_context(&mut conn, &req.key, Utc::now()).await?;
    match entry {
        Some(entry) => Ok(json!({
            "key": entry.key,
            "value": entry.value,
            "scope": entry.scope,
            "created_at": entry.created_at,
            "updated_at": entry.updated_at,
            "expires_at": entry.expires_at,
        })),
        None => Err(EngineError::NotFound(format!("context key '{}' not found", req.key))),
    }
}

pub async fn delete_context(State(state): State<AppState>, Json(req): Json<KeyRequest>) -> Json<Value> {
    envelope(delete_context_inner(&state, req).await)
}

async fn delete_context_inner(state: &AppState, req: KeyRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let deleted = context_store::delete_context(&mut conn, &req.key).await?;
    Ok(json!({"deleted": deleted}))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListContextKeysRequest {
    pub scope: Option<String>,
}

pub async fn list_context_keys(
    State(state): State<AppState>,
    Json(req): Json<ListContextKeysRequest>,
) -> Json<Value> {
    envelope(list_context_keys_inner(&state, req).await)
}

async fn list_context_keys_inner(state: &AppState, req: ListContextKeysRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let entries = context_store::list_context_keys(&mut conn, req.scope.as_deref(), Utc::now()).await?;
    let keys: Vec<Value> = entries
        .into_iter()
        .map(|e| json!({"key": e.key, "scope": e.scope, "expires_at": e.expires_at}))
        .collect();
    Ok(json!({"keys": keys}))
}

#[derive(Debug, Deserialize)]
pub struct ExtendContextTtlRequest {
    pub key: String,
    pub additional_hours: i64,
}

pub async fn extend_context_ttl(
    State(state): State<AppState>,
    Json(req): Json<ExtendContextTtlRequest>,
) -> Json<Value> {
    envelope(extend_context_ttl_inner(&state, req).await)
}

async fn extend_context_ttl_inner(state: &AppState, req: ExtendContextTtlRequest) -> Result<Value> {
    let mut conn = state.store.acquire().await?;
    let expires_at = context_store::extend_context_ttl(&mut conn, &req.key, req.additional_hours, Utc::now())
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("context key '{}' not found", req.key)))?;
    Ok(json!({"key": req.key, "expires_at": expires_at}))
}

fn validate_context_key(key: &str, max_len: usize) -> Result<()> {
    let is_legal_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    if key.is_empty() || !key.chars().all(is_legal_char) {
        return Err(EngineError::InvalidInput(
            "context key must match [A-Za-z0-9_.-]+".to_string(),
        ));
    }
    if key.chars().count() > max_len {
        return Err(EngineError::InvalidInput(format!("context key exceeds CONTEXT_MAX_KEY_LENGTH ({max_len})")));
    }
    Ok(())
}
