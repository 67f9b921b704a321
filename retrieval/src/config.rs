//! Configuration for the baggage policy assistant.
//!
//! Every section falls back to its defaults, so a config file only needs
//! the keys it changes:
//!
//! ```toml
//! [server]
//! model = "llama3.2:3b"
//!
//! [retrieval]
//! top_k = 5
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use baggage_documents::{ChunkerConfig, DocumentLoader};
use baggage_embeddings::{EmbeddingProvider, HashingProvider, OllamaEmbeddingProvider};
use baggage_ollama::{GenerationConfig, ServerConfig};

use crate::error::{Result, RetrievalError};

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "baggage-rag.toml";

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Where policy documents live.
    pub documents: DocumentsConfig,

    /// Chunking parameters.
    pub chunker: ChunkerConfig,

    /// Where the index snapshot lives.
    pub index: IndexConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Model server lifecycle.
    pub server: ServerConfig,

    /// Answer generation.
    pub generation: GenerationConfig,

    /// Query processing.
    pub retrieval: QueryConfig,

    /// Policy pages fetched by `download`.
    pub download: DownloadConfig,
}

impl RagConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `baggage-rag.toml` in the
    /// working directory is used when present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| RetrievalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(RetrievalError::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if self.embedding.timeout_secs == 0 {
            return Err(RetrievalError::Config(
                "embedding.timeout_secs must be positive".to_string(),
            ));
        }
        if self.server.max_attempts == 0 {
            return Err(RetrievalError::Config(
                "server.max_attempts must be positive".to_string(),
            ));
        }
        if self.chunker.min_chunk_size >= self.chunker.hard_limit() {
            return Err(RetrievalError::Config(
                "chunker.min_chunk_size must be below twice chunker.max_chunk_size".to_string(),
            ));
        }
        Ok(())
    }

    /// Document loader for the configured directory.
    pub fn document_loader(&self) -> DocumentLoader {
        DocumentLoader::new(&self.documents.dir)
            .with_extensions(self.documents.extensions.clone())
            .with_label_prefix(self.documents.label_prefix.clone())
            .with_max_depth(self.documents.max_depth)
    }

    /// Embedding provider described by the `[embedding]` section.
    pub fn embedding_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(match self.embedding.provider {
            EmbeddingProviderType::Ollama => {
                let base_url = self
                    .embedding
                    .base_url
                    .clone()
                    .unwrap_or_else(|| self.server.base_url.clone());
                Arc::new(
                    OllamaEmbeddingProvider::new()
                        .with_base_url(base_url)
                        .with_model(self.embedding.model.clone())
                        .with_dimension(self.embedding.dimension)
                        .with_batch_size(self.embedding.batch_size)
                        .with_timeout(Duration::from_secs(self.embedding.timeout_secs))?,
                )
            }
            EmbeddingProviderType::Hashing => {
                Arc::new(HashingProvider::new(self.embedding.dimension))
            }
        })
    }
}

/// Location and format of the policy documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Directory holding the documents.
    pub dir: PathBuf,

    /// File extensions to load.
    pub extensions: Vec<String>,

    /// Prefix stripped from file names before deriving source labels.
    pub label_prefix: String,

    /// Directory levels searched; 1 reads only `dir` itself.
    pub max_depth: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/raw"),
            extensions: ["html", "htm", "txt", "md"].map(String::from).to_vec(),
            label_prefix: "delta_".to_string(),
            max_depth: 1,
        }
    }
}

/// Location of the index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding `vectors.json` and `chunks.json`.
    pub dir: PathBuf,

    /// Builds producing fewer chunks than this fail.
    pub min_chunks: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/index"),
            min_chunks: 1,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// Ollama `/api/embed`.
    Ollama,
    /// Offline feature hashing.
    Hashing,
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: String,

    /// Vector dimension the model produces.
    pub dimension: usize,

    /// Embedding server, when different from `server.base_url`.
    pub base_url: Option<String>,

    /// Texts embedded per request.
    pub batch_size: usize,

    /// Timeout of a single embedding request, in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Ollama,
            model: "all-minilm".to_string(),
            dimension: baggage_embeddings::DEFAULT_DIMENSION,
            base_url: None,
            batch_size: 16,
            timeout_secs: 30,
        }
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of passages retrieved per question.
    pub top_k: usize,

    /// Pass passages to the model with their `[Source: ...]` header.
    pub include_source_labels: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            include_source_labels: true,
        }
    }
}

/// Policy pages to download, keyed by file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// File name to URL.
    pub urls: BTreeMap<String, String>,

    /// `User-Agent` sent with each request.
    pub user_agent: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let urls = [
            (
                "delta_domestic_contract.html",
                "https://www.delta.com/us/en/legal/contract-of-carriage-dgr",
            ),
            (
                "delta_international_contract.html",
                "https://www.delta.com/us/en/legal/contract-of-carriage-igr",
            ),
            (
                "delta_baggage_faqs.html",
                "https://www.delta.com/us/en/baggage/additional-baggage-information/baggage-faqs",
            ),
        ]
        .into_iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect();

        Self {
            urls,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_secs: 15,
        }
    }
}
