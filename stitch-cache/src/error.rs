//! Error types for cache operations
//!
//! Cache operations are best-effort from the caller's point of view: the
//! store logs and swallows per-entry failures. These errors surface from
//! the storage backends and from configuration validation.

use thiserror::Error;

/// Main error type for the bundle cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem or other I/O failure in a storage backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key cannot be mapped onto the backend
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Cache generation name did not follow `namespace@kind@version`
    #[error("Invalid generation name: {0}")]
    InvalidGeneration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::InvalidKey("../escape".to_string());
        assert_eq!(error.to_string(), "Invalid key: ../escape");

        let error = CacheError::InvalidGeneration("nope".to_string());
        assert!(error.to_string().contains("nope"));
    }

    #[test]
    fn test_error_conversion() {
        let error: CacheError = "test error".into();
        assert!(matches!(error, CacheError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: CacheError = io.into();
        assert!(matches!(error, CacheError::Io(_)));
    }
}
