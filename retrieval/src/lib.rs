//! # Retrieval
//!
//! Retrieval-augmented answering over airline baggage policy documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         build (offline)                         │
//! │  DocumentLoader ──► PolicyChunker ──► VectorIndex ──► Snapshot  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     RetrievalOrchestrator                       │
//! │  question ──► embed ──► top-k chunks ──► GenerationClient       │
//! │                                              │                  │
//! │                              ModelServerManager (Ollama)        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use baggage_retrieval::{RagConfig, RetrievalOrchestrator};
//!
//! let config = RagConfig::load(None)?;
//! let assistant = RetrievalOrchestrator::from_config(&config)?;
//! assistant.start().await?;
//! println!("{}", assistant.answer("How much is a second checked bag?").await);
//! assistant.shutdown().await;
//! ```

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod snapshot;

pub use builder::{BuildReport, build_index, index_documents};
pub use config::{
    DEFAULT_CONFIG_FILE, DocumentsConfig, DownloadConfig, EmbeddingConfig, EmbeddingProviderType,
    IndexConfig, QueryConfig, RagConfig,
};
pub use engine::{Answer, RetrievalOrchestrator, RetrievalOrchestratorBuilder, Source};
pub use error::{Result, RetrievalError};
pub use snapshot::{FORMAT_VERSION, SnapshotStore};
