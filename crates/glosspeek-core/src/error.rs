//! Error types for Glosspeek Core

use thiserror::Error;

/// Result type alias using the Glosspeek Error
pub type Result<T> = std::result::Result<T, Error>;

/// Glosspeek error types
#[derive(Error, Debug)]
pub enum Error {
    /// The coordinator refused the request before any network call was made
    /// (disabled, or a required credential is missing).
    #[error("{0}")]
    Configuration(String),

    /// The API answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No models found in the API response")]
    NoModels,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Coordinator is gone: {0}")]
    CoordinatorGone(String),
}
