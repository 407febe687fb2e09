//! The storage contract cache handles are built on.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CacheResult;

/// A recorded computation outcome.
///
/// Failures are cached alongside successes so a retried request replays the
/// same failure instead of re-attempting expensive work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CachedOutcome {
    /// A successful result.
    Value {
        /// The recorded value.
        value: Value,
    },
    /// A recorded failure.
    Error {
        /// The recorded error message.
        message: String,
    },
}

impl CachedOutcome {
    /// Wrap a successful value.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self::Value { value }
    }

    /// Wrap a failure message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Storage contract for cache backends.
///
/// Backends own durability and namespacing; the engine core treats them as
/// opaque. The one hard requirement is per-key linearizability: two
/// near-simultaneous `lookup`/`store` pairs for the same key must never
/// leave both callers believing their write was dropped - one write becomes
/// authoritative.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up a recorded outcome. Expired entries read as absent.
    async fn lookup(&self, key: &str) -> CacheResult<Option<CachedOutcome>>;

    /// Record an outcome under a key. `ttl = None` means no expiry.
    async fn store(&self, key: &str, outcome: CachedOutcome, ttl: Option<Duration>)
    -> CacheResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> CacheResult<()>;
}
