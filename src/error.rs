//! Error types for the cache backend
//!
//! Provides unified error handling using thiserror. A missing key is never
//! an error here: lookups model absence with `Option` or empty collections.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store unreachable or an I/O round-trip failed
    #[error("Backend failure: {0}")]
    Backend(String),

    /// Cache constructed without a backend or with an unusable config
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Wildcard reference could not be compiled into a matcher
    #[error("Invalid reference pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl CacheError {
    /// Shorthand for a backend failure with a formatted message.
    pub fn backend(msg: impl Into<String>) -> Self {
        CacheError::Backend(msg.into())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache backend.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CacheError::backend("connection reset").to_string(),
            "Backend failure: connection reset"
        );
        assert_eq!(
            CacheError::Configuration("no backend".into()).to_string(),
            "Configuration error: no backend"
        );
    }

    #[test]
    fn test_regex_error_converts() {
        let err: CacheError = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, CacheError::InvalidPattern(_)));
    }
}
