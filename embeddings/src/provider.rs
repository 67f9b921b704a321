//! Embedding providers.
//!
//! The retrieval core only needs "text in, fixed-length vector out". The
//! default provider asks the local Ollama server for MiniLM embeddings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_DIMENSION, Embedding};

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model to use (provider-specific).
    pub model: Option<String>,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,
}

impl EmbeddingResponse {
    /// Wrap a vector produced by `model`.
    pub fn new(embedding: Embedding, model: impl Into<String>) -> Self {
        let dimension = embedding.len();
        Self {
            embedding,
            model: model.into(),
            dimension,
        }
    }
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Generate embeddings for multiple texts, preserving order.
    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        // Default implementation: process sequentially
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.embed(request).await?);
        }
        Ok(results)
    }

    /// Check if the provider is usable with its current configuration.
    fn is_available(&self) -> bool;
}

/// Embedding provider backed by Ollama's `/api/embed` endpoint.
pub struct OllamaEmbeddingProvider {
    /// Server base URL, without the `/api` suffix.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model.
    default_model: String,

    /// Expected output dimension.
    dimension: usize,

    /// Texts sent per request.
    batch_size: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the local server and `all-minilm`.
    pub fn new() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            client: reqwest::Client::new(),
            default_model: "all-minilm".to_string(),
            dimension: DEFAULT_DIMENSION,
            batch_size: 16,
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the dimension the model is expected to produce.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set how many texts are sent per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    async fn embed_texts(&self, model: &str, texts: Vec<&str>) -> Result<Vec<Embedding>> {
        let expected = texts.len();
        let body = serde_json::json!({
            "model": model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "{status}: {error_text}"
            )));
        }

        let result: OllamaEmbedResponse = response.json().await?;
        if result.embeddings.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "requested {expected} embeddings, received {}",
                result.embeddings.len()
            )));
        }

        Ok(result.embeddings)
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.embed_batch(vec![request])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        if !self.is_available() {
            return Err(EmbeddingError::ProviderNotConfigured);
        }

        let mut responses = Vec::with_capacity(requests.len());
        for batch in requests.chunks(self.batch_size) {
            let model = batch[0]
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone());
            let texts: Vec<&str> = batch.iter().map(|r| r.text.as_str()).collect();

            debug!("Embedding {} texts with model: {model}", texts.len());
            let embeddings = self.embed_texts(&model, texts).await?;
            responses.extend(
                embeddings
                    .into_iter()
                    .map(|embedding| EmbeddingResponse::new(embedding, model.as_str())),
            );
        }

        info!("Generated {} embeddings", responses.len());
        Ok(responses)
    }

    fn is_available(&self) -> bool {
        !self.base_url.is_empty() && !self.default_model.is_empty()
    }
}

/// Ollama `/api/embed` response format.
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Embedding>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_embedding_request() {
        let request = EmbeddingRequest::new("Hello world").with_model("all-minilm");

        assert_eq!(request.text, "Hello world");
        assert_eq!(request.model, Some("all-minilm".to_string()));
    }

    #[tokio::test]
    async fn test_ollama_embed_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({ "model": "all-minilm" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "all-minilm",
                "embeddings": [[0.1, 0.2, 0.3], [0.3, 0.2, 0.1]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OllamaEmbeddingProvider::new()
            .with_base_url(server.uri())
            .with_dimension(3);
        let responses = provider
            .embed_batch(vec![
                EmbeddingRequest::new("first bag"),
                EmbeddingRequest::new("second bag"),
            ])
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(responses[1].dimension, 3);
        assert_eq!(responses[1].model, "all-minilm");
    }

    #[tokio::test]
    async fn test_ollama_embed_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2, 0.3]]
            })))
            .mount(&server)
            .await;

        let provider = OllamaEmbeddingProvider::new().with_base_url(server.uri());
        let result = provider
            .embed_batch(vec![EmbeddingRequest::new("a"), EmbeddingRequest::new("b")])
            .await;

        assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_ollama_embed_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let provider = OllamaEmbeddingProvider::new().with_base_url(server.uri());
        let result = provider.embed(EmbeddingRequest::new("a")).await;

        match result {
            Err(EmbeddingError::ApiRequest(message)) => assert!(message.contains("model not found")),
            other => panic!("expected ApiRequest error, got {other:?}"),
        }
    }
}
