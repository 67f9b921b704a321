//! # Embeddings
//!
//! This crate provides embedding generation and the flat similarity index
//! used to retrieve policy chunks.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors via a local Ollama server
//! - **Offline Hashing**: A deterministic bag-of-words embedder that needs no model
//! - **Similarity Search**: Exact top-k cosine search over unit vectors
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorIndex<T>             │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │  Ollama/Hashing       normalize        top_k                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod hashing;
pub mod index;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use hashing::HashingProvider;
pub use index::{SearchHit, VectorIndex};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OllamaEmbeddingProvider,
};
pub use similarity::{cosine_similarity, dot_product, normalize, top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings produced by `all-minilm` (MiniLM-L6-v2).
pub const DEFAULT_DIMENSION: usize = 384;
