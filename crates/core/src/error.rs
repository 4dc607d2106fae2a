//! Error types for docrag.
//!
//! A single error enum covers the retrieval taxonomy (dimension mismatch,
//! key extraction, unsupported query input, embedding failures, missing
//! collections, cancellation) as well as configuration, I/O and
//! serialization errors.

use thiserror::Error;

/// Unified error type for docrag.
///
/// All fallible functions return `Result<T, AppError>`. An empty search
/// result is never an error: it is represented by an empty vector.
#[derive(Error, Debug)]
pub enum AppError {
    /// Vector length differs from the dimension established by the collection
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// No recognized key field on an upsert candidate
    #[error("Key extraction failed: {0}")]
    KeyExtraction(String),

    /// Query is not a vector and no embedding capability is configured
    #[error("Unsupported query input: {0}")]
    UnsupportedQueryInput(String),

    /// The embedding capability failed (network, timeout, malformed response)
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Registry lookup miss where the collection was required to exist
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Operation observed its cancellation signal before mutating state
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ingestion and pipeline errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error was produced by the embedding capability.
    pub fn is_embedding_failure(&self) -> bool {
        matches!(self, AppError::Embedding(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
