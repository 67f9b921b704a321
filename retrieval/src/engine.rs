//! Question answering over the policy index.

use std::sync::Arc;

use tracing::{debug, info, warn};

use baggage_documents::Chunk;
use baggage_embeddings::{EmbeddingProvider, VectorIndex};
use baggage_ollama::{ErrorKind, GenerationClient, ModelServerManager, ServerHandle};

use crate::config::{EmbeddingProviderType, QueryConfig, RagConfig};
use crate::error::Result;
use crate::snapshot::SnapshotStore;

/// A retrieved passage that contributed to an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Label of the document the passage came from.
    pub label: String,

    /// Chunk ordinal within the index.
    pub ordinal: usize,

    /// Similarity with the question.
    pub score: f32,
}

/// An answer together with what it was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Model output, or an `Error: ...` message.
    pub text: String,

    /// Passages passed to the model, best first.
    pub sources: Vec<Source>,

    /// Whether the output hit the length cap.
    pub truncated: bool,

    /// Set when `text` is an error message.
    pub error: Option<ErrorKind>,
}

impl Answer {
    fn empty() -> Self {
        Self {
            text: String::new(),
            sources: Vec::new(),
            truncated: false,
            error: None,
        }
    }
}

/// Composes retrieval and generation.
///
/// Queries are handled one at a time: embed the question, take the top-k
/// chunks, and let the model answer from them. Query-time failures are
/// returned as answer text, never as errors.
pub struct RetrievalOrchestrator {
    index: VectorIndex<Chunk>,
    provider: Arc<dyn EmbeddingProvider>,
    server: Arc<ModelServerManager>,
    client: GenerationClient,
    embedding_model: Option<String>,
    config: QueryConfig,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator builder.
    pub fn builder(index: VectorIndex<Chunk>) -> RetrievalOrchestratorBuilder {
        RetrievalOrchestratorBuilder::new(index)
    }

    /// Load the snapshot and wire every component from `config`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let index = SnapshotStore::new(&config.index.dir).load()?;
        let server = Arc::new(ModelServerManager::new(config.server.clone()));
        let mut builder = Self::builder(index);
        if config.embedding.provider == EmbeddingProviderType::Ollama {
            builder = builder.with_embedding_model(config.embedding.model.clone());
        }
        builder
            .with_provider(config.embedding_provider()?)
            .with_client(GenerationClient::new(
                server.api().clone(),
                config.server.model.clone(),
                config.generation.clone(),
            ))
            .with_server(server)
            .with_query_config(config.retrieval.clone())
            .build()
    }

    /// Make sure the model server is up for the generation model, and
    /// holds the embedding model when questions are embedded by it.
    ///
    /// A startup timeout is fatal to the session and is returned as is.
    pub async fn start(&self) -> Result<ServerHandle> {
        let handle = self.server.ensure_running(self.client.model()).await?;
        if let Some(model) = &self.embedding_model {
            self.server.ensure_model(model).await?;
        }
        info!(
            "Assistant ready: {} chunks indexed, model {}",
            self.index.len(),
            handle.model_name
        );
        Ok(handle)
    }

    /// Answer a question with the model's text, or an error message.
    pub async fn answer(&self, query: &str) -> String {
        self.answer_detailed(query).await.text
    }

    /// Answer a question, keeping the retrieved sources.
    pub async fn answer_detailed(&self, query: &str) -> Answer {
        let query = query.trim();
        if query.is_empty() {
            return Answer::empty();
        }

        let hits = match self
            .index
            .search(query, self.config.top_k, self.provider.as_ref())
            .await
        {
            Ok(hits) => hits,
            Err(err) => {
                warn!("Retrieval failed: {err}");
                let detail: String = err.to_string().chars().take(100).collect();
                return Answer {
                    text: format!("Error: {detail}"),
                    error: Some(ErrorKind::Generic),
                    ..Answer::empty()
                };
            }
        };

        let passages: Vec<String> = hits
            .iter()
            .map(|hit| {
                if self.config.include_source_labels {
                    hit.item.text.clone()
                } else {
                    hit.item.body().to_string()
                }
            })
            .collect();
        let sources: Vec<Source> = hits
            .iter()
            .map(|hit| Source {
                label: hit.item.source_label.clone(),
                ordinal: hit.item.ordinal,
                score: hit.score,
            })
            .collect();
        debug!("Retrieved {} passages for: {query}", passages.len());

        let response = self.client.generate(query, &passages).await;
        Answer {
            text: response.text,
            sources,
            truncated: response.truncated,
            error: response.error,
        }
    }

    /// Stop the model server if this session started it.
    pub async fn shutdown(&self) {
        self.server.shutdown().await;
    }

    /// The shared server manager.
    pub fn server(&self) -> &Arc<ModelServerManager> {
        &self.server
    }
}

/// Builder for [`RetrievalOrchestrator`].
pub struct RetrievalOrchestratorBuilder {
    index: VectorIndex<Chunk>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    server: Option<Arc<ModelServerManager>>,
    client: Option<GenerationClient>,
    embedding_model: Option<String>,
    config: QueryConfig,
}

impl RetrievalOrchestratorBuilder {
    /// Create a builder around an index.
    pub fn new(index: VectorIndex<Chunk>) -> Self {
        Self {
            index,
            provider: None,
            server: None,
            client: None,
            embedding_model: None,
            config: QueryConfig::default(),
        }
    }

    /// Set the embedding provider used for questions.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the server manager.
    pub fn with_server(mut self, server: Arc<ModelServerManager>) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the generation client.
    pub fn with_client(mut self, client: GenerationClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Require an embedding model on the server at [`RetrievalOrchestrator::start`].
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Set the query configuration.
    pub fn with_query_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the orchestrator. Missing parts default to a local Ollama
    /// setup.
    pub fn build(self) -> Result<RetrievalOrchestrator> {
        let defaults = RagConfig::default();
        let server = self
            .server
            .unwrap_or_else(|| Arc::new(ModelServerManager::new(defaults.server.clone())));
        let client = self.client.unwrap_or_else(|| {
            GenerationClient::new(
                server.api().clone(),
                defaults.server.model.clone(),
                defaults.generation.clone(),
            )
        });

        let provider = match self.provider {
            Some(provider) => provider,
            None => defaults.embedding_provider()?,
        };

        Ok(RetrievalOrchestrator {
            index: self.index,
            provider,
            server,
            client,
            embedding_model: self.embedding_model,
            config: self.config,
        })
    }
}
