//! `EmbeddingEngine` implementation backed by an Ollama-compatible
//! `/api/embeddings` endpoint.
//!
//! The embedding model itself is a black-box batch encoder per spec
//! (out of scope for this crate's core work); this is just the thin
//! HTTP adapter that lets the orchestrator and QA service call one
//! without caring whether it's local Ollama, LM Studio, or anything
//! else speaking the same wire shape. One request per text — Ollama's
//! `/api/embeddings` has no native batch endpoint, so "batched" here
//! just means "looped with the caller none the wiser".

use async_trait::async_trait;
use codegraph_core::{CodeGraphError, EmbeddingConfig, EmbeddingEngine, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

pub struct OllamaEmbeddingEngine {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl OllamaEmbeddingEngine {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CodeGraphError::ModelLoad(format!("building embedding http client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = EmbeddingRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CodeGraphError::Embedding(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CodeGraphError::Embedding(format!(
                "embedding endpoint returned HTTP {status}: {text}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CodeGraphError::Embedding(format!("decoding embedding response: {e}")))?;

        if parsed.embedding.len() != self.config.dimension {
            debug!(
                expected = self.config.dimension,
                got = parsed.embedding.len(),
                "embedding endpoint returned an unexpected vector width"
            );
        }

        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingEngine for OllamaEmbeddingEngine {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_configured_dimension() {
        let config = EmbeddingConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 384,
            timeout_secs: 5,
        };
        let engine = OllamaEmbeddingEngine::new(config).unwrap();
        assert_eq!(engine.dimension(), 384);
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_as_embedding_error() {
        let config = EmbeddingConfig {
            base_url: "http://localhost:0".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 8,
            timeout_secs: 1,
        };
        let engine = OllamaEmbeddingEngine::new(config).unwrap();
        let err = engine.embed_batch(&["int main(void){}".to_string()]).await.unwrap_err();
        assert!(matches!(err, CodeGraphError::Embedding(_)));
    }
}
