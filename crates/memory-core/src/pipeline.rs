use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::identity::deterministic_id;
use crate::llm::LlmGateway;
use crate::primer;
use crate::store::{memories, taxonomy, Store};
use crate::types::{Section, VolatilityClass};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use uuid::Uuid;

/// What Step 3 decided for one section, before Step 4 persists it.
enum SectionOutcome {
    /// The content already exists (exact dup or a near-duplicate neighbour).
    Duplicate { effective_id: Uuid },
    Insert {
        id: Uuid,
        content: String,
        embedding: Vec<f32>,
        category_path: String,
        supersedes: Option<Uuid>,
        volatility_class: VolatilityClass,
        tags: Vec<String>,
        is_new_profile_insert: bool,
    },
}

impl SectionOutcome {
    fn effective_id(&self) -> Uuid {
        match self {
            SectionOutcome::Duplicate { effective_id } => *effective_id,
            SectionOutcome::Insert { id, .. } => *id,
        }
    }
}

/// Runs the full ingestion pipeline against `raw_text`: taxonomy priming,
/// segmentation, per-section dedup/conflict evaluation under a shared
/// store-access lock, batched transactional persistence, and a primer
/// refresh. Returns the id of the first persisted or referenced memory.
pub async fn run_ingestion_pipeline(
    store: &Store,
    gateway: &dyn LlmGateway,
    config: &Config,
    raw_text: &str,
    ttl_days: Option<i64>,
) -> Result<Uuid> {
    // Step 1 — taxonomy priming.
    let mut conn = store.acquire().await?;
    let existing_paths = taxonomy::top_category_paths(&mut conn, config.max_taxonomy_paths as i64).await?;
    drop(conn);

    // Step 2 — segmentation, filtered and normalized.
    let raw_sections = gateway.segment(raw_text, &existing_paths).await?;
    let sections: Vec<Section> = raw_sections
        .into_iter()
        .map(|mut s| {
            s.content = s.content.trim().to_string();
            s
        })
        .filter(|s| s.content.chars().count() >= config.min_section_length)
        .collect();

    if sections.is_empty() {
        return Err(EngineError::NoSectionsProduced);
    }

    // Step 3 — per-section evaluation, fanned out concurrently under one
    // store-access lock (scoped to this job) and the gateway's own LLM gate.
    let store_lock: Mutex<()> = Mutex::new(());
    let futures = sections
        .iter()
        .map(|section| evaluate_section(store, gateway, config, section, &store_lock));
    let outcomes: Vec<Result<SectionOutcome>> = join_all(futures).await;
    let outcomes: Vec<SectionOutcome> = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

    // Step 4 — batched persistence, one transaction per CHUNK_BATCH_SIZE
    // sections, sequence_next edges stitched across batch boundaries.
    let mut first_effective_id: Option<Uuid> = None;
    let mut prev_effective_id: Option<Uuid> = None;
    let mut profile_changed = false;
    let now = Utc::now();

    for batch in outcomes.chunks(config.chunk_batch_size) {
        let mut tx = store.begin().await?;
        for outcome in batch {
            let effective_id = outcome.effective_id();
            if first_effective_id.is_none() {
                first_effective_id = Some(effective_id);
            }

            match outcome {
                SectionOutcome::Duplicate { effective_id } => {
                    memories::bump_last_accessed(&mut tx, *effective_id, now).await?;
                }
                SectionOutcome::Insert {
                    id,
                    content,
                    embedding,
                    category_path,
                    supersedes,
                    volatility_class,
                    tags,
                    is_new_profile_insert,
                } => {
                    let verify_after = volatility_class.verify_after_from(now);
                    let mut metadata = serde_json::json!({
                        "volatility_class": volatility_class.to_string(),
                        "tags": tags,
                    });
                    if let Some(days) = ttl_days {
                        metadata["ttl_days"] = serde_json::json!(days);
                    }

                    memories::upsert(&mut tx, *id, content, embedding, category_path, *supersedes, verify_after, &metadata, now).await?;

                    if let Some(old_id) = supersedes {
                        memories::mark_superseded(&mut tx, *old_id, *id, now).await?;
                        memories::rewire_edges_on_supersession(&mut tx, *old_id, *id).await?;
                    }

                    memories::insert_relates_to_edges(&mut tx, *id, category_path, embedding, config.relates_to_threshold).await?;

                    if *is_new_profile_insert {
                        profile_changed = true;
                    }
                }
            }

            if let Some(prev_id) = prev_effective_id {
                if prev_id != effective_id {
                    memories::insert_sequence_next_edge(&mut tx, prev_id, effective_id).await?;
                }
            }
            prev_effective_id = Some(effective_id);
        }
        tx.commit().await?;
    }

    // Step 5 — primer refresh.
    primer::refresh_primer(store, gateway, profile_changed).await?;

    first_effective_id.ok_or(EngineError::NoSectionsProduced)
}

/// Step 3 for one section: decide duplicate / conflict-supersede / fresh
/// insert. Store reads (existence check, neighbour lookup) happen under
/// `store_lock`; the LLM calls (embed, arbitrate) do not need it — the
/// gateway's own semaphore is what gates those process-wide.
async fn evaluate_section(
    store: &Store,
    gateway: &dyn LlmGateway,
    config: &Config,
    section: &Section,
    store_lock: &Mutex<()>,
) -> Result<SectionOutcome> {
    let chunk_id = deterministic_id(&section.content);

    let already_exists = {
        let _guard = store_lock.lock().await;
        let mut conn = store.acquire().await?;
        memories::exists(&mut conn, chunk_id).await?
    };
    if already_exists {
        return Ok(SectionOutcome::Duplicate { effective_id: chunk_id });
    }

    let embedding = gateway.embed(&section.content).await?;

    let neighbor = {
        let _guard = store_lock.lock().await;
        let mut conn = store.acquire().await?;
        memories::nearest_active_neighbor_in_subtree(&mut conn, &embedding, &section.category_path).await?
    };

    let is_new_profile_insert = section.category_path == "profile" || section.category_path.starts_with("profile.");

    match neighbor {
        Some((neighbor_memory, similarity)) if similarity > config.dup_threshold => {
            Ok(SectionOutcome::Duplicate { effective_id: neighbor_memory.id })
        }
        Some((neighbor_memory, similarity)) if similarity >= config.conflict_threshold => {
            // Both `merges` and `supersedes` resolve the same way here: the
            // arbiter already folded the distinction into `updated_text`.
            let outcome = gateway.arbitrate(&neighbor_memory.content, &section.content).await?;
            let updated_embedding = gateway.embed(&outcome.updated_text).await?;
            let new_id = Uuid::new_v4();
            Ok(SectionOutcome::Insert {
                id: new_id,
                content: outcome.updated_text,
                embedding: updated_embedding,
                category_path: section.category_path.clone(),
                supersedes: Some(neighbor_memory.id),
                volatility_class: section.volatility_class,
                tags: section.tags.clone(),
                is_new_profile_insert,
            })
        }
        _ => Ok(SectionOutcome::Insert {
            id: chunk_id,
            content: section.content.clone(),
            embedding,
            category_path: section.category_path.clone(),
            supersedes: None,
            volatility_class: section.volatility_class,
            tags: section.tags.clone(),
            is_new_profile_insert,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_outcome_effective_id_matches_branch() {
        let id = Uuid::new_v4();
        let dup = SectionOutcome::Duplicate { effective_id: id };
        assert_eq!(dup.effective_id(), id);

        let insert = SectionOutcome::Insert {
            id,
            content: "x".to_string(),
            embedding: vec![0.0],
            category_path: "reference.unknown".to_string(),
            supersedes: None,
            volatility_class: VolatilityClass::Low,
            tags: vec![],
            is_new_profile_insert: false,
        };
        assert_eq!(insert.effective_id(), id);
    }
}
