pub mod admin;
pub mod context;
pub mod memory;
pub mod search;

use crate::state::AppState;
use axum::routing::post;
use axum::Router;

/// Route table shared by both ports, built on `Router<AppState>` so it can
/// still be extended with more `.route()` calls before state is attached.
fn production_routes() -> Router<AppState> {
    Router::new()
        .route("/initialize_context", post(context::initialize_context))
        .route("/memorize_context", post(context::memorize_context))
        .route("/check_ingestion_status", post(context::check_ingestion_status))
        .route("/set_context", post(context::set_context))
        .route("/get_context", post(context::get_context))
        .route("/delete_context", post(context::delete_context))
        .route("/list_context_keys", post(context::list_context_keys))
        .route("/extend_context_ttl", post(context::extend_context_ttl))
        .route("/search_memory", post(search::search_memory))
        .route("/list_categories", post(search::list_categories))
        .route("/explore_taxonomy", post(search::explore_taxonomy))
        .route("/fetch_document", post(search::fetch_document))
        .route("/trace_history", post(search::trace_history))
        .route("/confirm_memory_validity", post(memory::confirm_memory_validity))
        .route("/update_memory", post(memory::update_memory))
        .route("/update_memory_metadata", post(memory::update_memory_metadata))
        .route("/recategorize_memory", post(memory::recategorize_memory))
        .route("/bulk_move_category", post(memory::bulk_move_category))
}

/// Read + ingest + update surface — every tool a normal caller needs.
pub fn production_router(state: AppState) -> Router {
    production_routes().with_state(state)
}

/// Superset of the production surface plus destructive/operational tools.
/// Mounted on its own port, never bearer-gated — placement on a private
/// network is the access control.
pub fn admin_router(state: AppState) -> Router {
    production_routes()
        .route("/delete_memory", post(admin::delete_memory))
        .route("/prune_history", post(admin::prune_history))
        .route("/export_memories", post(admin::export_memories))
        .route("/run_diagnostics", post(admin::run_diagnostics))
        .route("/get_ingestion_stats", post(admin::get_ingestion_stats))
        .route("/flush_staging", post(admin::flush_staging))
        .with_state(state)
}
