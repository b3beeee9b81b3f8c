use crate::config::Config;
use crate::error::Result;
use crate::identity::deterministic_id;
use crate::llm::LlmGateway;
use crate::retrieval::render_taxonomy_tree;
use crate::store::{memories, primer_cache, taxonomy, Store};
use chrono::Utc;
use uuid::Uuid;

pub const PRIMER_PATH: &str = "reference.system.primer";

const PRIMER_TAXONOMY_MAX_DEPTH: usize = 2;
const PRIMER_TAXONOMY_MAX_BRANCH_NODES: usize = 50;

/// Rebuilds the single canonical primer record from current state. Skips
/// the expensive profile re-summarization when `profile_changed` is false
/// and a cached briefing already exists — this is the "cheap path" Step 5
/// of ingestion takes on every non-profile job.
pub async fn refresh_primer(store: &Store, gateway: &dyn LlmGateway, profile_changed: bool) -> Result<Uuid> {
    let mut conn = store.acquire().await?;

    let cached = primer_cache::get_cached_user_context(&mut conn).await?;
    let user_context = match (&cached, profile_changed) {
        (Some(prose), false) => prose.clone(),
        _ => {
            let chunks = taxonomy::profile_chunks(&mut conn).await?;
            let prose = gateway.summarize_profile(&chunks).await?;
            primer_cache::set_cached_user_context(&mut conn, &prose, Utc::now()).await?;
            prose
        }
    };

    let counts = taxonomy::category_counts(&mut conn).await?;
    let (taxonomy_tree, total) = render_taxonomy_tree(&counts, PRIMER_TAXONOMY_MAX_DEPTH, PRIMER_TAXONOMY_MAX_BRANCH_NODES);

    let primer_text = build_primer_text(total, &user_context, &taxonomy_tree);
    let primer_id = deterministic_id(&primer_text);
    let embedding = gateway.embed(&primer_text).await?;

    let mut tx = store.begin().await?;
    let now = Utc::now();

    let existing = memories::active_ids_at_exact_path(&mut tx, PRIMER_PATH).await?;
    for old_id in existing {
        if old_id == primer_id {
            continue;
        }
        memories::mark_superseded(&mut tx, old_id, primer_id, now).await?;
        memories::rewire_edges_on_supersession(&mut tx, old_id, primer_id).await?;
    }

    memories::upsert(
        &mut tx,
        primer_id,
        &primer_text,
        &embedding,
        PRIMER_PATH,
        None,
        None,
        &serde_json::json!({"volatility_class": "static"}),
        now,
    )
    .await?;

    tx.commit().await?;
    Ok(primer_id)
}

/// Same fixed sections every primer carries: a user-context briefing, a
/// collapsed taxonomy tree, the verification protocol, and short usage
/// guides for the context store and the retrieval tools — so any caller
/// that reads the primer knows exactly what's available without having to
/// ask again.
fn build_primer_text(total_memories: i64, user_context: &str, taxonomy_tree: &str) -> String {
    format!(
        "SYSTEM PRIMER\n\
         =============\n\n\
         This record is regenerated automatically whenever the knowledge base changes \
         materially. It is not meant to be edited directly.\n\n\
         ## User Context\n\
         {user_context}\n\n\
         ## Taxonomy ({total_memories} active records)\n\
         {taxonomy_tree}\n\
         Use explore_taxonomy(path) to expand any collapsed branch shown above.\n\n\
         ## Verification Protocol\n\
         Every record carries a volatility class that determines how long it is trusted \
         before it is flagged for re-confirmation. Records surfaced as expired should be \
         confirmed with confirm_memory_validity(id) if still accurate, or corrected with \
         update_memory(id, new_content) if not.\n\n\
         ## Context Store Guide\n\
         Use set_context/get_context for short-lived, session-scoped working data that does \
         not belong in long-term memory — it expires on its own and never competes with \
         memorize_context for space in the taxonomy.\n\n\
         ## Retrieval Guide\n\
         Use search_memory(query) for open-ended recall, fetch_document(memory_id) to pull a \
         full multi-chunk record back together, and trace_history(memory_id) to see what a \
         record used to say before it was superseded."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primer_text_embeds_total_and_sections() {
        let text = build_primer_text(42, "A short briefing about the user.", "profile/: identity (1)\n");
        assert!(text.contains("42 active records"));
        assert!(text.contains("A short briefing about the user."));
        assert!(text.contains("Verification Protocol"));
        assert!(text.contains("Context Store Guide"));
        assert!(text.contains("Retrieval Guide"));
    }

    #[test]
    fn primer_text_is_deterministic() {
        let a = build_primer_text(1, "x", "y");
        let b = build_primer_text(1, "x", "y");
        assert_eq!(deterministic_id(&a), deterministic_id(&b));
    }
}
