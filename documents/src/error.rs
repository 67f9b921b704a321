//! Error types for document loading.

use thiserror::Error;

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors that can occur while loading policy documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Directory traversal failed.
    #[error("failed to walk document directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A built-in HTML pattern failed to compile.
    #[error("invalid html pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}
