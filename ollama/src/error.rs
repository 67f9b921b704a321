//! Error types for the Ollama integration.

use thiserror::Error;

/// Result type alias for Ollama operations.
pub type Result<T> = std::result::Result<T, OllamaError>;

/// Errors that can occur while managing or talking to the model server.
#[derive(Error, Debug)]
pub enum OllamaError {
    /// The server never became ready within the polling budget.
    #[error(
        "model server did not become ready after {attempts} attempts; check that `ollama` is installed and on PATH, or start it with `ollama serve`"
    )]
    ServerStartupTimeout { attempts: u32 },

    /// The server process could not be launched or stopped.
    #[error("failed to control `{executable}` process: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error.
    #[error("server error: {0}")]
    Server(String),

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl OllamaError {
    /// Whether the failure came from a timeout anywhere in the chain.
    pub fn is_timeout(&self) -> bool {
        match self {
            OllamaError::Http(err) => err.is_timeout() || err.to_string().to_lowercase().contains("timeout"),
            other => other.to_string().to_lowercase().contains("timeout"),
        }
    }
}
