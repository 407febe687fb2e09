//! Cache error types.

use thiserror::Error;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The storage backend failed.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A cached value could not be (de)serialized.
    #[error("cache serialization error: {0}")]
    Serialization(String),

    /// Misuse of the caching API within a single invocation.
    #[error("illegal cache state: {0}")]
    IllegalState(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
