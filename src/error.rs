//! Error types for the RAG pipeline.

use thiserror::Error;

/// Errors surfaced by document processing and conversation turns.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A document could not be read or parsed
    #[error("Failed to extract text from '{source_name}': {message}")]
    Extraction {
        source_name: String,
        message: String,
    },

    /// File extension not handled by any extractor
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Embedding request failed outside of index construction
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Index construction failed; the previous index stays active
    #[error("Indexing error: {0}")]
    Indexing(String),

    /// Retrieval attempted before any index was published
    #[error("No document index is available. Process documents first")]
    IndexNotReady,

    /// Answer generation failed mid-stream or produced nothing
    #[error("Generation error: {0}")]
    Generation(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn extraction(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn indexing(msg: impl Into<String>) -> Self {
        Self::Indexing(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for RAG operations.
pub type Result<T> = std::result::Result<T, Error>;
