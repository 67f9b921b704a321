//! Error types for the retrieval pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while building or serving the index.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Too few chunks to build an index from.
    #[error("corpus produced {chunks} chunks, at least {required} required")]
    InsufficientCorpus { chunks: usize, required: usize },

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] baggage_embeddings::EmbeddingError),

    /// Model server error.
    #[error("model server error: {0}")]
    Server(#[from] baggage_ollama::OllamaError),

    /// Document loading error.
    #[error("document error: {0}")]
    Documents(#[from] baggage_documents::DocumentError),

    /// No snapshot at the expected location.
    #[error("no index snapshot in {}; rebuild with `baggage-rag build`", dir.display())]
    SnapshotMissing { dir: PathBuf },

    /// Snapshot files exist but do not form a consistent index.
    #[error("index snapshot is corrupt ({0}); rebuild with `baggage-rag build`")]
    SnapshotCorrupt(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
