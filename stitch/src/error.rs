//! Error types for the stitch server and agent
//!
//! Per-bundle problems (a handler that fails, a bundle nobody produces) are
//! not errors at this level: the concatenator renders them as diagnostic
//! chunks. What remains is registration misuse, origin failures and payloads
//! that cannot be split.

use stitch_cache::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StitchError {
    /// A dedicated handler was already registered under this name
    #[error("Duplicate bundle({name}) added")]
    DuplicateRegistration { name: String },

    /// A handler raised while producing a bundle
    #[error("Handler for {id} failed: {message}")]
    HandlerFailure { id: String, message: String },

    /// The origin could not be reached or answered with a failure status
    #[error("Network error: {0}")]
    Network(String),

    /// A marker or payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StitchError {
    fn from(e: reqwest::Error) -> Self {
        StitchError::Network(e.to_string())
    }
}

/// Result type alias for stitch operations
pub type Result<T> = std::result::Result<T, StitchError>;
