//! Store error types.

use thiserror::Error;

/// Store operation errors.
///
/// Every variant is a transport, serialization or backend failure; callers
/// treat all of them as retryable. A missing entity is not an error, it is
/// reported as `None` or `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("in-process store lock poisoned")]
    LockPoisoned,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
