//! Embedding providers
//!
//! The retrieval index only needs text → vector. Two bindings:
//!
//! - `openai/<model>`: the OpenAI embeddings endpoint, batched, with
//!   exponential backoff on rate limits and server errors
//! - `hash/<dims>`: a deterministic hashed bag-of-words embedder that needs
//!   no network, for offline runs and tests

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ai::provider::ModelSelector;
use crate::config::{EmbedderConfig, LlmConfig};
use crate::constants::network;
use crate::types::{ErrorCategory, ErrorClassifier, LlmError, Result, WikiError};

/// Text embedding capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            WikiError::Embedding(LlmError::with_provider(
                ErrorCategory::ParseError,
                "empty embedding response",
                self.model_name(),
            ))
        })
    }

    /// Model identifier, recorded alongside a persisted index
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;
}

pub type SharedEmbedder = Arc<dyn Embedder>;

/// Create an embedder from configuration
pub fn create_embedder(config: &EmbedderConfig, llm: &LlmConfig) -> Result<SharedEmbedder> {
    let selector: ModelSelector = config.model.parse()?;
    match selector.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(&selector.model, config, llm)?)),
        "hash" => {
            let dims = selector.model.parse().map_err(|_| {
                WikiError::Config(format!(
                    "hash embedder needs a dimension, e.g. hash/256, got {}",
                    config.model
                ))
            })?;
            Ok(Arc::new(HashEmbedder::new(dims)))
        }
        other => Err(WikiError::Config(format!(
            "Unknown embedding provider: {}. Supported: openai, hash",
            other
        ))),
    }
}

// =============================================================================
// OpenAI
// =============================================================================

pub struct OpenAiEmbedder {
    api_key: SecretString,
    api_base: String,
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
    max_retries: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OpenAiEmbedder {
    pub fn new(model: &str, config: &EmbedderConfig, llm: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| llm.api_key.clone())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                WikiError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var or embedder.api_key"
                        .to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WikiError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: config
                .api_base
                .clone()
                .or_else(|| llm.api_base.clone())
                .unwrap_or_else(|| network::DEFAULT_OPENAI_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn embed_batch_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        if let Some(dims) = self.dimensions {
            body["dimensions"] = dims.into();
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| WikiError::Embedding(ErrorClassifier::classify_transport(&e, "openai")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WikiError::Embedding(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &text,
                "openai",
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| WikiError::LlmApi(format!("Failed to parse embedding response: {}", e)))?;

        // Order by index; the API does not promise input order
        parsed.data.sort_by_key(|d| d.index);
        if parsed.data.len() != texts.len() {
            return Err(WikiError::LlmApi(format!(
                "Embedding count mismatch: sent {}, received {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let policy = ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(network::BASE_DELAY_MS))
                .with_max_delay(Duration::from_secs(network::MAX_DELAY_SECS))
                .with_max_times(self.max_retries)
                .with_jitter();

            let embedded = (|| self.embed_batch_once(batch))
                .retry(policy)
                .when(|e: &WikiError| e.is_retryable())
                // A provider-supplied wait never shortens the backoff
                .adjust(|e: &WikiError, delay: Option<Duration>| delay.map(|d| e.retry_after().map_or(d, |r| r.max(d))))
                .notify(|e: &WikiError, delay: Duration| {
                    warn!("Embedding request failed, retrying in {:?}: {}", delay, e);
                })
                .await?;
            debug!("Embedded batch of {} texts", batch.len());
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dimensions.unwrap_or(1536)
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// =============================================================================
// Hashed bag-of-words
// =============================================================================

/// Deterministic offline embedder
///
/// Lowercased alphanumeric tokens are hashed into `dims` buckets and the
/// vector is L2-normalized, so texts sharing vocabulary score as similar.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            name: format!("hash-{dims}"),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let bucket = crc32fast::hash(token.as_bytes()) as usize % self.dims;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_query("parse the config file").await.unwrap();
        let b = embedder.embed_query("parse the config file").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed_query("  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_create_hash_embedder() {
        let config = EmbedderConfig {
            model: "hash/128".into(),
            ..Default::default()
        };
        let embedder = create_embedder(&config, &LlmConfig::default()).unwrap();
        assert_eq!(embedder.dims(), 128);
        assert_eq!(embedder.model_name(), "hash-128");
    }

    #[test]
    fn test_create_embedder_rejects_bad_hash_dims() {
        let config = EmbedderConfig {
            model: "hash/many".into(),
            ..Default::default()
        };
        assert!(create_embedder(&config, &LlmConfig::default()).is_err());
    }

    #[test]
    fn test_embedding_response_sorted_by_index() {
        let mut parsed: EmbeddingResponse = serde_json::from_value(serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        }))
        .unwrap();
        parsed.data.sort_by_key(|d| d.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0, 0.0]);
    }
}
