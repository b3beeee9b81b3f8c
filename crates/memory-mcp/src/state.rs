use memory_core::llm::LlmGateway;
use memory_core::{Config, Store};
use std::sync::Arc;

/// Shared application state, cloned (cheaply — every field is an `Arc` or a
/// pool handle) into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub gateway: Arc<dyn LlmGateway>,
    pub config: Arc<Config>,
}
