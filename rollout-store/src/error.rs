//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-specific errors.
///
/// These are infrastructure failures. The feature layer never retries or
/// masks them; they surface to the caller unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis-specific error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command was rejected by the backend
    #[error("Command error: {0}")]
    Command(String),

    /// Value could not be encoded or decoded by the backend
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation timeout
    #[error("Operation timed out")]
    Timeout,
}

impl StoreError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        #[cfg(feature = "redis")]
        if let Self::Redis(err) = self {
            return err.is_timeout() || err.is_connection_dropped() || err.is_io_error();
        }

        matches!(self, Self::Connection(_) | Self::Timeout)
    }
}
