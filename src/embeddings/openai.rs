use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::EmbeddingCache;
use crate::config::EmbeddingsConfig;
use crate::error::{Result, TogError};
use crate::scoring::Embedder;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI embeddings client
///
/// Embeds question and relation texts for the embedding ranking strategy.
/// Relation names recur across questions, so every text goes through the
/// LRU cache when one is configured.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    batch_size: usize,
    max_retries: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new embedder; `batch_size` is capped at the API limit of 2048.
    pub fn new(api_key: String, model: String, batch_size: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            batch_size: batch_size.clamp(1, 2048),
            max_retries: 3,
            cache: None,
        })
    }

    /// Build from the `[embeddings]` section, with a cache of the configured capacity.
    pub fn from_config(config: &EmbeddingsConfig, api_key: String) -> Result<Self> {
        let embedder = Self::new(api_key, config.model.clone(), config.batch_size)?;
        Ok(embedder.with_cache(Arc::new(EmbeddingCache::new(config.cache_capacity))))
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Embed texts in API-sized batches, preserving order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.embed_with_retry(chunk).await?);
        }
        Ok(all_embeddings)
    }

    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.embed_batch_internal(texts).await {
                Ok(embeddings) if embeddings.len() == texts.len() => return Ok(embeddings),
                Ok(embeddings) => {
                    return Err(TogError::Embedding(format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        embeddings.len()
                    )))
                }
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    log::warn!(
                        "Retry {}/{} after {:?}: {}",
                        attempt,
                        self.max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn embed_batch_internal(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| TogError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(TogError::Embedding(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| TogError::Embedding(format!("Failed to parse response: {}", e)))?;

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Rate limits, server errors and network failures.
fn is_retryable(error: &TogError) -> bool {
    let message = error.to_string();
    ["Network error", "429", "500", "502", "503", "504"]
        .iter()
        .any(|needle| message.contains(needle))
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let Some(cache) = &self.cache else {
            return self.embed_batch(texts).await;
        };

        let mut out: Vec<Option<Vec<f32>>> = texts.iter().map(|t| cache.get(t)).collect();
        let misses: Vec<String> = texts
            .iter()
            .zip(&out)
            .filter(|(_, hit)| hit.is_none())
            .map(|(text, _)| text.clone())
            .collect();
        log::debug!("Embedding cache: {} hits, {} misses", texts.len() - misses.len(), misses.len());

        let mut fresh = self.embed_batch(&misses).await?.into_iter();
        for (slot, text) in out.iter_mut().zip(texts) {
            if slot.is_none() {
                let embedding = fresh
                    .next()
                    .ok_or_else(|| TogError::Embedding("embedding batch too short".to_string()))?;
                cache.put(text.clone(), embedding.clone());
                *slot = Some(embedding);
            }
        }
        Ok(out.into_iter().flatten().collect())
    }
}
