//! A deterministic, offline [`LlmGateway`] for tests — no network calls, no
//! nondeterminism. `tests/e2e` and this crate's own unit tests depend on it
//! so the pipeline's control flow can be exercised without a real model.

use crate::config::Config;
use crate::error::Result;
use crate::identity::sanitize_path;
use crate::llm::LlmGateway;
use crate::types::{ArbitrationOutcome, ArbitrationResolution, Section, VolatilityClass};
use async_trait::async_trait;

/// Embeds by hashing, segments by blank-line paragraph, always resolves
/// conflicts as `supersedes` with the new text winning outright, and
/// summarizes a profile by truncating its chunks into one line.
pub struct FakeGateway {
    pub embed_dim: usize,
}

impl FakeGateway {
    pub fn new(embed_dim: usize) -> Self {
        FakeGateway { embed_dim }
    }

    pub fn from_config(config: &Config) -> Self {
        FakeGateway::new(config.embed_dim)
    }
}

/// Cheap, stable pseudo-embedding: every dimension is a deterministic
/// function of the text's bytes, so identical text always embeds identically
/// and near-identical text embeds nearby (same prefix bytes dominate).
fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
    let bytes = text.as_bytes();
    (0..dim)
        .map(|i| {
            let mut acc: u64 = i as u64 + 1;
            for (j, b) in bytes.iter().enumerate() {
                acc = acc.wrapping_mul(31).wrapping_add(*b as u64).wrapping_add(j as u64);
            }
            ((acc % 2000) as f32 / 1000.0) - 1.0
        })
        .collect()
}

#[async_trait]
impl LlmGateway for FakeGateway {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embed(text, self.embed_dim))
    }

    async fn segment(&self, text: &str, _existing_taxonomy_paths: &[String]) -> Result<Vec<Section>> {
        let paragraphs: Vec<&str> = text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();
        let paragraphs = if paragraphs.is_empty() { vec![text.trim()] } else { paragraphs };

        Ok(paragraphs
            .into_iter()
            .map(|p| Section {
                content: p.to_string(),
                category_path: sanitize_path(guess_category(p)),
                tags: Vec::new(),
                volatility_class: VolatilityClass::Low,
            })
            .collect())
    }

    async fn arbitrate(&self, _old_text: &str, new_text: &str) -> Result<ArbitrationOutcome> {
        Ok(ArbitrationOutcome {
            resolution: ArbitrationResolution::Supersedes,
            updated_text: new_text.to_string(),
        })
    }

    async fn summarize_profile(&self, chunks: &[String]) -> Result<String> {
        if chunks.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("The user is known for: {}.", chunks.join("; ")))
    }
}

/// A `Config` sized for `FakeGateway` and short test fixtures: small
/// `embed_dim`, a `min_section_length` short test sentences actually clear,
/// and the rest of the teacher's `valid_config()` defaults.
pub fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        openai_api_key: "sk-test".to_string(),
        embedding_model: "text-embedding-3-small".to_string(),
        extract_model: "gpt-5-mini".to_string(),
        conflict_model: "gpt-5-nano".to_string(),
        embed_dim: 16,
        default_search_limit: 10,
        default_list_limit: 50,
        openai_timeout_s: 60,
        openai_max_retries: 5,
        max_concurrent_api_calls: 5,
        pg_pool_min: 1,
        pg_pool_max: 5,
        dup_threshold: 0.95,
        conflict_threshold: 0.55,
        relates_to_threshold: 0.65,
        min_section_length: 5,
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

/// Crude keyword routing so pipeline tests see plausible, non-`reference.unknown`
/// category paths without needing a real model. Not used outside tests.
fn guess_category(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains(" i live") || lower.contains(" i am") || lower.contains("my name") {
        "profile.identity"
    } else if lower.contains("project") || lower.contains("billing service") {
        "projects.active"
    } else if lower.contains("acme") || lower.contains("employer") || lower.contains("company") {
        "organizations.employer"
    } else {
        "reference.unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic() {
        let gw = FakeGateway::new(8);
        let a = gw.embed("hello world").await.unwrap();
        let b = gw.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn segment_splits_on_blank_lines() {
        let gw = FakeGateway::new(8);
        let sections = gw.segment("first part\n\nsecond part", &[]).await.unwrap();
        assert_eq!(sections.len(), 2);
    }
}
