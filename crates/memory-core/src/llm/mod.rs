pub mod prompts;
pub mod retry;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::identity::{sanitize_path, truncate_text};
use crate::types::{ArbitrationOutcome, ArbitrationResolution, Section, VolatilityClass};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// The three capabilities the core asks of an external LLM, plus the
/// fourth (`summarize_profile`) used only by the Primer Synthesizer. Any
/// provider satisfying this contract is substitutable — callers depend on
/// the trait, never on `OpenAiGateway` directly.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn segment(&self, text: &str, existing_taxonomy_paths: &[String]) -> Result<Vec<Section>>;

    async fn arbitrate(&self, old_text: &str, new_text: &str) -> Result<ArbitrationOutcome>;

    async fn summarize_profile(&self, chunks: &[String]) -> Result<String>;
}

/// Minimum section length and fallback/normalization rules live here (not
/// in `prompts.rs`) because they are post-processing on the model's
/// response, not part of the prompt contract.
const MIN_SECTION_LENGTH_FLOOR: usize = 1;

/// Real gateway backed by the OpenAI-compatible Chat Completions and
/// Embeddings HTTP APIs. Every call goes through the shared semaphore
/// (process-wide LLM concurrency cap) and the retry wrapper.
pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: String,
    embedding_model: String,
    extract_model: String,
    conflict_model: String,
    embed_dim: usize,
    min_section_length: usize,
    max_retries: u32,
    semaphore: Arc<Semaphore>,
    base_url: String,
}

impl OpenAiGateway {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openai_timeout_s))
            .build()
            .expect("reqwest client builds with a static config");

        OpenAiGateway {
            client,
            api_key: config.openai_api_key.clone(),
            embedding_model: config.embedding_model.clone(),
            extract_model: config.extract_model.clone(),
            conflict_model: config.conflict_model.clone(),
            embed_dim: config.embed_dim,
            min_section_length: config.min_section_length.max(MIN_SECTION_LENGTH_FLOOR),
            max_retries: config.openai_max_retries,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_api_calls)),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    async fn chat_completion(&self, model: &str, system_prompt: &str, user_content: &str) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content},
            ],
        });

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }

        let client = &self.client;
        let api_key = &self.api_key;
        let raw = retry::with_retries(self.max_retries, || async {
            let resp = client
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| (EngineError::LLMUnavailable(e.to_string()), true))?;

            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                let retryable = retry::is_retryable_status(status);
                let text = resp.text().await.unwrap_or_default();
                return Err((EngineError::LLMUnavailable(format!("HTTP {status}: {text}")), retryable));
            }

            let parsed: ChatResponse = resp
                .json()
                .await
                .map_err(|e| (EngineError::LLMUnavailable(e.to_string()), true))?;
            Ok(parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default())
        })
        .await?;

        Ok(raw)
    }
}

/// Strips markdown code-fence markers before JSON parsing, per the
/// segmenter's "must tolerate code-fenced output" requirement.
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let url = format!("{}/embeddings", self.base_url);
        let body = json!({"model": self.embedding_model, "input": text});

        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }
        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let client = &self.client;
        let api_key = &self.api_key;
        let vec = retry::with_retries(self.max_retries, || async {
            let resp = client
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| (EngineError::LLMUnavailable(e.to_string()), true))?;

            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                let retryable = retry::is_retryable_status(status);
                let text = resp.text().await.unwrap_or_default();
                return Err((EngineError::LLMUnavailable(format!("HTTP {status}: {text}")), retryable));
            }

            let parsed: EmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| (EngineError::LLMUnavailable(e.to_string()), true))?;
            Ok(parsed
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .unwrap_or_default())
        })
        .await?;

        if vec.len() != self.embed_dim {
            return Err(EngineError::EmbeddingDimMismatch {
                expected: self.embed_dim,
                actual: vec.len(),
            });
        }
        Ok(vec)
    }

    async fn segment(&self, text: &str, existing_taxonomy_paths: &[String]) -> Result<Vec<Section>> {
        let system_prompt = prompts::segment_system_prompt(existing_taxonomy_paths);

        #[derive(Deserialize)]
        struct RawSection {
            content: String,
            category_path: String,
            #[serde(default)]
            tags: Vec<String>,
            #[serde(default)]
            volatility_class: String,
        }
        #[derive(Deserialize)]
        struct RawSections {
            #[serde(default)]
            sections: Vec<RawSection>,
        }

        let fallback = || {
            vec![Section {
                content: text.to_string(),
                category_path: "reference.unknown".to_string(),
                tags: Vec::new(),
                volatility_class: VolatilityClass::Low,
            }]
        };

        let raw = match self.chat_completion(&self.extract_model, &system_prompt, text).await {
            Ok(raw) => raw,
            Err(_) => return Ok(fallback()),
        };

        let cleaned = strip_code_fences(&raw);
        let parsed: RawSections = match serde_json::from_str(&cleaned) {
            Ok(p) => p,
            Err(_) => return Ok(fallback()),
        };

        if parsed.sections.is_empty() {
            return Ok(fallback());
        }

        let sections: Vec<Section> = parsed
            .sections
            .into_iter()
            .map(|s| Section {
                category_path: sanitize_path(&s.category_path),
                volatility_class: VolatilityClass::from_str(&s.volatility_class).unwrap_or_default(),
                tags: s.tags,
                content: s.content,
            })
            .filter(|s| s.content.trim().chars().count() >= self.min_section_length)
            .collect();

        if sections.is_empty() {
            return Ok(fallback());
        }

        Ok(sections)
    }

    async fn arbitrate(&self, old_text: &str, new_text: &str) -> Result<ArbitrationOutcome> {
        let safe_old = truncate_text(old_text, 6000);
        let safe_new = truncate_text(new_text, 6000);
        let user_content = format!("<old_text>{safe_old}</old_text>\n\n<new_text>{safe_new}</new_text>");

        let fallback = || ArbitrationOutcome {
            resolution: ArbitrationResolution::Supersedes,
            updated_text: new_text.to_string(),
        };

        #[derive(Deserialize)]
        struct RawOutcome {
            #[serde(default)]
            resolution: String,
            #[serde(default)]
            updated_text: String,
        }

        let raw = match self
            .chat_completion(&self.conflict_model, prompts::ARBITRATE_SYSTEM_PROMPT, &user_content)
            .await
        {
            Ok(raw) => raw,
            Err(_) => return Ok(fallback()),
        };

        let cleaned = strip_code_fences(&raw);
        let parsed: RawOutcome = match serde_json::from_str(&cleaned) {
            Ok(p) => p,
            Err(_) => return Ok(fallback()),
        };

        if parsed.updated_text.trim().is_empty() {
            return Ok(fallback());
        }

        Ok(ArbitrationOutcome {
            resolution: ArbitrationResolution::from_str(&parsed.resolution).unwrap_or(ArbitrationResolution::Supersedes),
            updated_text: parsed.updated_text,
        })
    }

    async fn summarize_profile(&self, chunks: &[String]) -> Result<String> {
        if chunks.is_empty() {
            return Ok(String::new());
        }
        let combined = chunks.join("\n\n---\n\n");
        let user_content = format!("User memory records:\n\n{combined}");
        match self
            .chat_completion(&self.extract_model, prompts::SUMMARIZE_PROFILE_SYSTEM_PROMPT, &user_content)
            .await
        {
            Ok(text) => Ok(text.trim().to_string()),
            Err(_) => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_removes_json_markers() {
        let fenced = "```json\n{\"sections\":[]}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"sections\":[]}");
    }

    #[test]
    fn strip_code_fences_noop_on_plain_json() {
        let plain = "{\"a\":1}";
        assert_eq!(strip_code_fences(plain), plain);
    }
}
