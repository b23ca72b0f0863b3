//! Error types for tag cache operations
//!
//! Every failure of the storage backend is surfaced to the caller through
//! [`TagCacheError`]. Nothing is retried and nothing is swallowed; the only
//! failure handled locally is a stored value that does not parse, which
//! degrades a read to raw values instead of erroring.

use std::time::Duration;
use thiserror::Error;

/// Main error type for tag cache operations
#[derive(Error, Debug)]
pub enum TagCacheError {
    /// Backend unreachable, connection refused or dropped
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A client-level timeout elapsed before the backend answered
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    TimeoutError { timeout_ms: u64, context: String },

    /// An atomic batch was refused; none of its commands took effect
    #[error("Batch rejected: {0}")]
    BatchRejectedError(String),

    /// Any other error reported by the backend
    #[error("Backend error: {0}")]
    BackendError(String),

    /// The payload could not be encoded for storage
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A key or tag list that must not be empty was empty
    #[error("Empty argument: at least one {0} is required")]
    EmptyArgumentError(&'static str),
}

/// Result type alias for tag cache operations
pub type Result<T> = std::result::Result<T, TagCacheError>;

impl TagCacheError {
    /// Whether the error means the backend could not be reached at all
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            TagCacheError::ConnectionError(_) | TagCacheError::TimeoutError { .. }
        )
    }

    /// Reclassify an error from a batch that is known to have had no effect.
    ///
    /// Connection-level failures keep their meaning.
    pub(crate) fn into_batch_rejection(self) -> Self {
        match self {
            TagCacheError::BackendError(msg) => TagCacheError::BatchRejectedError(msg),
            other => other,
        }
    }

    /// Classify a Redis error from a round trip bounded by `timeout`
    pub(crate) fn from_redis(e: redis::RedisError, timeout: Duration, context: &str) -> Self {
        if e.is_timeout() {
            TagCacheError::TimeoutError {
                timeout_ms: millis(timeout),
                context: format!("{}: {}", context, e),
            }
        } else {
            TagCacheError::from(e)
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<redis::RedisError> for TagCacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            // No bound known here; see `from_redis`
            TagCacheError::ConnectionError(format!("timed out waiting for Redis: {}", e))
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            TagCacheError::ConnectionError(e.to_string())
        } else if e.kind() == redis::ErrorKind::ExecAbortError {
            TagCacheError::BatchRejectedError(e.to_string())
        } else {
            TagCacheError::BackendError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for TagCacheError {
    fn from(e: serde_json::Error) -> Self {
        TagCacheError::SerializationError(e.to_string())
    }
}
