//! Error types for cache backend operations.
//!
//! These never leave [`crate::CacheService`]; the service logs them, counts
//! them and degrades to a miss or a no-op.

use std::time::Duration;
use thiserror::Error;

/// Error types for cache backend operations
#[derive(Debug, Error)]
pub enum CacheBackendError {
    /// Connection error
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Serialization error
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("Cache operation timeout after {0:?}")]
    Timeout(Duration),

    /// Backend not available
    #[error("Cache backend not available: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Cache configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CacheBackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheBackendError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}

/// Result type for cache backend operations
pub type CacheResult<T> = Result<T, CacheBackendError>;
