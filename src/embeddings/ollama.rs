use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Embedding provider backed by a local Ollama server
pub struct OllamaEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    dimension: AtomicUsize, // updated at runtime if the model disagrees with the config
}

impl OllamaEmbeddingProvider {
    /// Create a new provider
    /// Default URL: http://127.0.0.1:11434, default model: nomic-embed-text (768 dims)
    pub fn new(base_url: Option<&str>, model: Option<&str>, dimension: Option<usize>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or("http://127.0.0.1:11434")
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or("nomic-embed-text").to_string(),
            dimension: AtomicUsize::new(dimension.unwrap_or(768)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Some(&config.embeddings.url),
            Some(&config.embeddings.model),
            Some(config.embeddings.dims),
        )
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn compute_embedding(&self, content: &str) -> Result<Vec<f32>> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("Cannot generate embedding for empty content");
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: content,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama API returned error: {}", response.status());
        }

        let embedding_response: OllamaEmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse Ollama embedding response")?;

        if embedding_response.embedding.is_empty() {
            anyhow::bail!("Ollama returned an empty embedding");
        }

        let actual = embedding_response.embedding.len();
        let expected = self.dimension.load(Ordering::Relaxed);
        if actual != expected {
            info!(
                model = %self.model,
                actual, expected, "embedding dimension differs from config, adopting model's"
            );
            self.dimension.store(actual, Ordering::Relaxed);
        }

        Ok(embedding_response.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[test]
    fn test_ollama_provider_defaults() {
        let provider = OllamaEmbeddingProvider::new(None, None, None);
        assert_eq!(provider.base_url, "http://127.0.0.1:11434");
        assert_eq!(provider.model, "nomic-embed-text");
        assert_eq!(provider.dimension(), 768);
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let provider = OllamaEmbeddingProvider::new(Some("http://127.0.0.1:1"), None, None);
        assert!(provider.compute_embedding("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_dimension_follows_model_output() {
        let router = Router::new().fallback(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "tiny-embed");
            Json(json!({"embedding": [0.5, 0.5, 0.5]}))
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let url = format!("http://{addr}");
        let provider = OllamaEmbeddingProvider::new(Some(&url), Some("tiny-embed"), Some(1024));
        let embedding = provider.compute_normalized("hello there").await.unwrap();

        assert_eq!(provider.dimension(), 3);
        let norm: f32 = embedding.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
