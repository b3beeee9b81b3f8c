use thiserror::Error;

/// Errors surfaced across the engine's public API.
///
/// Tool-surface callers never let these cross the RPC boundary as HTTP
/// errors; they are mapped to a `{ok:false, error:string}` envelope instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch { expected: usize, actual: usize },

    #[error("LLM gateway unavailable: {0}")]
    LLMUnavailable(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("no sections produced from input")]
    NoSectionsProduced,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Truncates the diagnostic string the way the job-queue worker truncates
    /// failure reasons before persisting them (at most 1000 chars).
    pub fn truncated_message(&self, max_len: usize) -> String {
        let full = self.to_string();
        if full.len() <= max_len {
            full
        } else {
            full.chars().take(max_len).collect()
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => EngineError::NotFound("row not found".to_string()),
            other => EngineError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
