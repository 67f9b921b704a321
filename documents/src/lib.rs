//! # Policy Documents
//!
//! Turns a directory of raw policy pages into an ordered list of labeled,
//! size-bounded chunks ready for embedding.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Policy Documents                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  DocumentLoader ──► Document ──► PolicyChunker ──► Chunk        │
//! │       │                               │                         │
//! │       ▼                               ▼                         │
//! │  HtmlTextExtractor             chunk_documents (sentinel)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod chunker;
pub mod corpus;
pub mod error;
pub mod loader;

pub use chunker::{Chunk, ChunkerConfig, PolicyChunker};
pub use corpus::{SENTINEL_LABEL, chunk_documents};
pub use error::{DocumentError, Result};
pub use loader::{Document, DocumentLoader, HtmlTextExtractor};
