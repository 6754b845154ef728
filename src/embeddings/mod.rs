// Embedding subsystem
//
// The indexer talks to embeddings through the `EmbeddingProvider` seam: the
// production implementation is an HTTP client to the external GPU service,
// tests plug in deterministic providers. The queue coalesces requests into
// adaptive batches with bounded concurrency; the vector store holds one row
// per file and answers cosine nearest-neighbor queries.

pub mod client;
pub mod queue;
pub mod vector_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub use client::HttpEmbeddingClient;
pub use queue::{EmbeddingQueue, QueueMetricsSnapshot};
pub use vector_store::{VectorRow, VectorSearchResult, VectorStore};

/// Env override for the embedding service endpoint.
pub const EMBEDDING_SERVICE_URL_ENV: &str = "EMBEDDING_SERVICE_URL";
/// Env override for the embedding model name.
pub const EMBEDDING_MODEL_ENV: &str = "EMBEDDING_MODEL";

/// Anything that can turn texts into vectors.
///
/// `embed_batch` returns one entry per input; `None` means the service could
/// not embed that particular text. A returned error fails the whole batch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>>;

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let mut batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        Ok(batch.pop().flatten())
    }
}

/// Embedding client and queue configuration with the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub service_url: String,
    pub model: String,
    pub min_batch: usize,
    pub max_batch: usize,
    pub initial_batch: usize,
    pub flush_interval_ms: u64,
    pub max_concurrent: usize,
    pub retry_attempts: usize,
    pub retry_delays_ms: Vec<u64>,
    pub target_latency_ms: u64,
    /// Upper bound for any single service request.
    pub global_timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8765/embed".to_string(),
            model: "embeddinggemma".to_string(),
            min_batch: 50,
            max_batch: 150,
            initial_batch: 100,
            flush_interval_ms: 500,
            max_concurrent: 3,
            retry_attempts: 3,
            retry_delays_ms: vec![100, 500, 2000],
            target_latency_ms: 3000,
            global_timeout_ms: 60_000,
        }
    }
}

impl EmbeddingConfig {
    /// Defaults with `EMBEDDING_SERVICE_URL` / `EMBEDDING_MODEL` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(EMBEDDING_SERVICE_URL_ENV) {
            if !url.trim().is_empty() {
                config.service_url = url;
            }
        }
        if let Ok(model) = std::env::var(EMBEDDING_MODEL_ENV) {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        config
    }
}

/// Cosine similarity; zero vectors compare as orthogonal.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.2, -0.3];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn zero_vector_never_divides_by_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn config_defaults_match_the_contract() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.min_batch, 50);
        assert_eq!(config.max_batch, 150);
        assert_eq!(config.initial_batch, 100);
        assert_eq!(config.flush_interval_ms, 500);
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.retry_delays_ms, vec![100, 500, 2000]);
        assert_eq!(config.target_latency_ms, 3000);
    }
}
