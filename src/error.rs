//! Error types for the state partition index.
//!
//! Core index operations are infallible; these errors come from the
//! name-keyed surface, configuration, and report serialization.

use thiserror::Error;

/// Main error type for index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Unknown state name: {0}")]
    UnknownState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
