//! The capability bundle handed to handlers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::invocation::TransportContext;
use crate::task::{ChallengeRequest, FetchRequest, TaskOutcome};
use relay_cache::{CacheHandle, InlineDedup};
use relay_crypto::TrustedCaller;

/// Deferred-fetch capability.
///
/// In normal mode the first call for a given request suspends (returns
/// [`TaskOutcome::Suspended`]); once the caller has delivered the result via
/// the reserved `"task"` action, the same call returns
/// [`TaskOutcome::Ready`]. In test mode results are produced synchronously
/// with no suspension and no cache writes.
#[async_trait]
pub trait FetchCapability: Send + Sync {
    /// Fetch through the caller.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Handler`](crate::EngineError::Handler) if a
    /// previously delivered result recorded a failure, or a cache error if
    /// the slot lookup fails.
    async fn fetch(&self, request: FetchRequest) -> EngineResult<TaskOutcome>;
}

/// Deferred human-verification capability; same suspension contract as
/// [`FetchCapability`].
#[async_trait]
pub trait ChallengeCapability: Send + Sync {
    /// Request a completed challenge token from the caller.
    ///
    /// # Errors
    ///
    /// Same contract as [`FetchCapability::fetch`].
    async fn challenge(&self, request: ChallengeRequest) -> EngineResult<TaskOutcome>;
}

/// Everything a handler may touch besides its own input.
///
/// This is a closed struct, not an open map: the engine decides what
/// handlers can reach, and additions are API changes.
#[derive(Clone)]
pub struct Capabilities {
    /// Transport-level context of the invocation.
    pub transport: TransportContext,
    /// Trusted signature data; `None` on auth-exempt actions.
    pub trusted: Option<TrustedCaller>,
    /// The addon-scoped cache handle.
    pub cache: CacheHandle,
    /// The per-invocation request-dedup helper.
    pub dedup: Arc<InlineDedup>,
    /// Deferred fetch through the caller.
    pub fetch: Arc<dyn FetchCapability>,
    /// Deferred human verification through the caller.
    pub challenge: Arc<dyn ChallengeCapability>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("transport", &self.transport)
            .field("trusted", &self.trusted)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
