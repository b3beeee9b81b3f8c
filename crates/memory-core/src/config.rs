use crate::error::{EngineError, Result};

/// Every recognized environment variable, enumerated in one place with
/// defaults and validated eagerly at startup (fail fast rather than at
/// first use).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,

    pub embedding_model: String,
    pub extract_model: String,
    pub conflict_model: String,
    pub embed_dim: usize,

    pub default_search_limit: i64,
    pub default_list_limit: i64,

    pub openai_timeout_s: u64,
    pub openai_max_retries: u32,
    pub max_concurrent_api_calls: usize,

    pub pg_pool_min: u32,
    pub pg_pool_max: u32,

    pub dup_threshold: f64,
    pub conflict_threshold: f64,
    pub relates_to_threshold: f64,

    pub min_section_length: usize,
    pub max_taxonomy_paths: usize,
    pub chunk_batch_size: usize,

    pub production_port: u16,
    pub admin_port: u16,

    pub staging_retention_days: i64,
    pub max_memorize_text_length: usize,

    pub context_default_ttl_hours: i64,
    pub context_max_value_length: usize,
    pub context_max_key_length: usize,

    pub api_key: Option<String>,
    pub log_level: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| EngineError::InvalidInput(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads and validates configuration from the process environment.
    /// `DATABASE_URL` and `OPENAI_API_KEY` are required; their absence is a
    /// fatal startup error, not a default.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            EngineError::InvalidInput("DATABASE_URL is required".to_string())
        })?;
        let openai_api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            EngineError::InvalidInput("OPENAI_API_KEY is required".to_string())
        })?;

        let config = Config {
            database_url,
            openai_api_key,
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            extract_model: env_or("EXTRACT_MODEL", "gpt-5-mini"),
            conflict_model: env_or("CONFLICT_MODEL", "gpt-5-nano"),
            embed_dim: parse_env("EMBED_DIM", 1536usize)?,
            default_search_limit: parse_env("DEFAULT_SEARCH_LIMIT", 10i64)?,
            default_list_limit: parse_env("DEFAULT_LIST_LIMIT", 50i64)?,
            openai_timeout_s: parse_env("OPENAI_TIMEOUT_S", 60u64)?,
            openai_max_retries: parse_env("OPENAI_MAX_RETRIES", 5u32)?,
            max_concurrent_api_calls: parse_env("MAX_CONCURRENT_API_CALLS", 5usize)?,
            pg_pool_min: parse_env("PG_POOL_MIN", 1u32)?,
            pg_pool_max: parse_env("PG_POOL_MAX", 10u32)?,
            dup_threshold: parse_env("DUP_THRESHOLD", 0.95f64)?,
            conflict_threshold: parse_env("CONFLICT_THRESHOLD", 0.55f64)?,
            relates_to_threshold: parse_env("RELATES_TO_THRESHOLD", 0.65f64)?,
            min_section_length: parse_env("MIN_SECTION_LENGTH", 100usize)?,
            max_taxonomy_paths: parse_env("MAX_TAXONOMY_PATHS", 40usize)?,
            chunk_batch_size: parse_env("CHUNK_BATCH_SIZE", 10usize)?,
            production_port: parse_env("PRODUCTION_PORT", 8766u16)?,
            admin_port: parse_env("ADMIN_PORT", 8767u16)?,
            staging_retention_days: parse_env("STAGING_RETENTION_DAYS", 7i64)?,
            max_memorize_text_length: parse_env("MAX_MEMORIZE_TEXT_LENGTH", 500_000usize)?,
            context_default_ttl_hours: parse_env("CONTEXT_DEFAULT_TTL_HOURS", 24i64)?,
            context_max_value_length: parse_env("CONTEXT_MAX_VALUE_LENGTH", 50_000usize)?,
            context_max_key_length: parse_env("CONTEXT_MAX_KEY_LENGTH", 200usize)?,
            api_key: std::env::var("API_KEY").ok(),
            log_level: env_or("LOG_LEVEL", "INFO"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.embed_dim == 0 {
            return Err(EngineError::InvalidInput("EMBED_DIM must be positive".to_string()));
        }
        if self.pg_pool_min > self.pg_pool_max {
            return Err(EngineError::InvalidInput(
                "PG_POOL_MIN must not exceed PG_POOL_MAX".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dup_threshold)
            || !(0.0..=1.0).contains(&self.conflict_threshold)
            || !(0.0..=1.0).contains(&self.relates_to_threshold)
        {
            return Err(EngineError::InvalidInput(
                "similarity thresholds must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_thresholds() {
        let mut config = valid_config();
        config.dup_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_pool_bounds() {
        let mut config = valid_config();
        config.pg_pool_min = 20;
        config.pg_pool_max = 5;
        assert!(config.validate().is_err());
    }

    fn valid_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".to_string(),
            openai_api_key: "sk-test".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            extract_model: "gpt-5-mini".to_string(),
            conflict_model: "gpt-5-nano".to_string(),
            embed_dim: 1536,
            default_search_limit: 10,
            default_list_limit: 50,
            openai_timeout_s: 60,
            openai_max_retries: 5,
            max_concurrent_api_calls: 5,
            pg_pool_min: 1,
            pg_pool_max: 10,
            dup_threshold: 0.95,
            conflict_threshold: 0.55,
            relates_to_threshold: 0.65,
            min_section_length: 100,
            max_taxonomy_paths: 40,
            chunk_batch_size: 10,
            production_port: 8766,
            admin_port: 8767,
            staging_retention_days: 7,
            max_memorize_text_length: 500_000,
            context_default_ttl_hours: 24,
            context_max_value_length: 50_000,
            context_max_key_length: 200,
            api_key: None,
            log_level: "INFO".to_string(),
        }
    }
}
