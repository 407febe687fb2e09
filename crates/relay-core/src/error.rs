//! The engine-wide error taxonomy.

use relay_cache::CacheError;
use thiserror::Error;

/// Errors that can abort an invocation.
///
/// Every variant maps to a status-500 response carrying the error's message
/// as `{"error": <message>}`. A cache short-circuit is deliberately *not*
/// represented here: replaying a recorded outcome is an expected result,
/// modeled as [`DedupGate::Replay`](relay_cache::DedupGate::Replay).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The addon declares no handler for the requested action.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The invocation's signature is missing, malformed, or untrusted.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Wire input or handler output failed shape validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A handler for an action that must produce a result returned null.
    #[error("Nothing found")]
    NothingFound,

    /// The handler or one of its capabilities failed.
    #[error("{0}")]
    Handler(String),

    /// Misuse of an engine API (double response, double inline entry).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The cache backend failed.
    #[error("cache error: {0}")]
    Cache(String),
}

impl EngineError {
    /// Whether this error should be kept off the operator error channel.
    ///
    /// Silent errors still produce a status-500 response; they are expected
    /// domain outcomes rather than operational faults.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NothingFound)
    }
}

impl From<CacheError> for EngineError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::IllegalState(message) => Self::IllegalState(message),
            other => Self::Cache(other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_found_message_is_user_facing() {
        assert_eq!(EngineError::NothingFound.to_string(), "Nothing found");
        assert!(EngineError::NothingFound.is_silent());
    }

    #[test]
    fn cache_illegal_state_maps_to_illegal_state() {
        let err: EngineError = CacheError::IllegalState("double inline".to_string()).into();
        assert!(matches!(err, EngineError::IllegalState(_)));

        let err: EngineError = CacheError::Backend("io".to_string()).into();
        assert!(matches!(err, EngineError::Cache(_)));
    }
}
