//! # Ollama
//!
//! Management of a local Ollama server and streamed answer generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ModelServerManager                       │
//! │   ServerLauncher ──► ServerProcess     OllamaApi (/api/tags) │
//! │        kill / launch / terminate       poll ──► pull once    │
//! ├──────────────────────────────────────────────────────────────┤
//! │                     GenerationClient                         │
//! │   pre-flight ──► /api/chat (NDJSON) ──► FragmentStream       │
//! │                         capped accumulation ──► response     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod process;
pub mod server;

pub use api::{ChatOptions, DEFAULT_BASE_URL, FragmentStream, OllamaApi, model_matches};
pub use client::{
    ErrorKind, GenerationClient, GenerationConfig, GenerationRequest, GenerationResponse,
    build_prompt,
};
pub use error::{OllamaError, Result};
pub use process::{OllamaLauncher, ServerLauncher, ServerProcess};
pub use server::{DEFAULT_MODEL, ModelServerManager, Readiness, ServerConfig, ServerHandle};
