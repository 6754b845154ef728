// HTTP embedding client
//
// POST {service_url} with {"texts": [...], "model": "..."} and expect
// {"embeddings": [[f32] | null, ...]} with one entry per text. Non-2xx and
// transport failures retry with the configured delays; after exhaustion the
// whole batch rejects with the last error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EmbeddingConfig, EmbeddingProvider};
use crate::errors::{IndexError, Result};

pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

#[derive(Serialize)]
struct EmbedRequestBody<'a> {
    texts: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponseBody {
    embeddings: Vec<Option<Vec<f32>>>,
}

impl HttpEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.global_timeout_ms))
            .build()
            .map_err(|e| IndexError::config(format!("cannot build http client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    async fn try_post(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        let body = EmbedRequestBody {
            texts,
            model: &self.config.model,
        };
        let response = self
            .http
            .post(&self.config.service_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::embedding(format!(
                "embedding service returned {status}"
            )));
        }

        let parsed: EmbedResponseBody = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(IndexError::embedding(format!(
                "embedding count mismatch: sent {}, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_error = None;
        for attempt in 0..=self.config.retry_attempts {
            if attempt > 0 {
                let delay = self
                    .config
                    .retry_delays_ms
                    .get(attempt - 1)
                    .or(self.config.retry_delays_ms.last())
                    .copied()
                    .unwrap_or(1000);
                debug!(attempt, delay_ms = delay, "retrying embedding batch");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.try_post(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    warn!(attempt, error = %e, "embedding batch attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| IndexError::embedding("embedding batch failed with no attempts")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_the_wire_contract() {
        let texts = vec!["hello".to_string()];
        let body = EmbedRequestBody {
            texts: &texts,
            model: "m1",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["texts"][0], "hello");
        assert_eq!(json["model"], "m1");
    }

    #[test]
    fn response_body_accepts_null_entries() {
        let parsed: EmbedResponseBody =
            serde_json::from_str(r#"{"embeddings": [[0.1, 0.2], null]}"#).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
        assert!(parsed.embeddings[0].is_some());
        assert!(parsed.embeddings[1].is_none());
    }

    #[tokio::test]
    async fn unreachable_service_rejects_after_retries() {
        // Nothing listens on this port; keep delays tiny so the test is fast.
        let config = EmbeddingConfig {
            service_url: "http://127.0.0.1:1/embed".to_string(),
            retry_attempts: 1,
            retry_delays_ms: vec![1],
            global_timeout_ms: 500,
            ..Default::default()
        };
        let client = HttpEmbeddingClient::new(config).unwrap();
        let result = client.embed_batch(&["x".to_string()]).await;
        assert!(matches!(result, Err(IndexError::Embedding(_))));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let client = HttpEmbeddingClient::new(EmbeddingConfig::default()).unwrap();
        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    }
}
