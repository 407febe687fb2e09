//! Per-invocation request deduplication.
//!
//! [`InlineDedup`] wraps a [`CacheHandle`] for the duration of one
//! invocation. It enforces the one-entry-per-invocation rule and carries the
//! short-circuit state the dispatcher consults after the handler returns.
//! A short-circuit is an expected control-flow outcome, never an error, so
//! it is modeled as the [`DedupGate::Replay`] variant rather than thrown
//! through unrelated layers.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::backend::CachedOutcome;
use crate::error::{CacheError, CacheResult};
use crate::handle::{CacheHandle, InlineEntry, InlineLookup};

/// What the handler should do after asking to begin deduplicated work.
#[derive(Debug)]
pub enum DedupGate {
    /// No prior attempt: proceed with the computation. The helper records
    /// the final outcome when the dispatcher completes the invocation.
    Fresh,
    /// A prior attempt completed: return immediately without recomputing.
    /// The dispatcher responds with the recorded outcome.
    Replay(CachedOutcome),
}

#[derive(Debug)]
enum DedupState {
    Idle,
    Pending(InlineEntry),
    Replayed(CachedOutcome),
    Completed,
}

/// The request-dedup helper bound to one invocation's cache handle.
#[derive(Debug)]
pub struct InlineDedup {
    handle: CacheHandle,
    engaged: AtomicBool,
    state: Mutex<DedupState>,
}

impl InlineDedup {
    /// Create a helper over the invocation's scoped cache handle.
    #[must_use]
    pub fn new(handle: CacheHandle) -> Self {
        Self {
            handle,
            engaged: AtomicBool::new(false),
            state: Mutex::new(DedupState::Idle),
        }
    }

    /// Begin deduplicated work under `key`.
    ///
    /// At most one call per invocation is allowed; handlers that never call
    /// this simply run undeduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::IllegalState`] on a second call within the same
    /// invocation, or [`CacheError::Backend`] if the lookup fails.
    pub async fn begin(&self, key: &str) -> CacheResult<DedupGate> {
        if self.engaged.swap(true, Ordering::SeqCst) {
            return Err(CacheError::IllegalState(
                "inline cache entry already requested for this invocation".to_string(),
            ));
        }

        match self.handle.inline(key).await? {
            InlineLookup::Absent(entry) => {
                *self.state.lock().await = DedupState::Pending(entry);
                Ok(DedupGate::Fresh)
            }
            InlineLookup::Found(value) => {
                let outcome = CachedOutcome::value(value);
                *self.state.lock().await = DedupState::Replayed(outcome.clone());
                Ok(DedupGate::Replay(outcome))
            }
            InlineLookup::FoundError(message) => {
                let outcome = CachedOutcome::error(message);
                *self.state.lock().await = DedupState::Replayed(outcome.clone());
                Ok(DedupGate::Replay(outcome))
            }
        }
    }

    /// Whether [`InlineDedup::begin`] was called during this invocation.
    #[must_use]
    pub fn engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// The recorded outcome to replay, if `begin` hit a prior attempt.
    pub async fn short_circuit(&self) -> Option<CachedOutcome> {
        match &*self.state.lock().await {
            DedupState::Replayed(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    /// Record the invocation's final output as the success outcome.
    ///
    /// No-op unless a fresh entry is pending.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the write fails.
    pub async fn complete_ok(&self, value: Value) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, DedupState::Completed) {
            DedupState::Pending(entry) => entry.set(value).await,
            other => {
                *state = other;
                Ok(())
            }
        }
    }

    /// Record the invocation's failure as the error outcome.
    ///
    /// No-op unless a fresh entry is pending.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the write fails.
    pub async fn complete_err(&self, message: &str) -> CacheResult<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, DedupState::Completed) {
            DedupState::Pending(entry) => entry.set_error(message).await,
            other => {
                *state = other;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::options::CacheOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn cache() -> CacheHandle {
        CacheHandle::new(Arc::new(MemoryBackend::new())).scoped("addon", CacheOptions::default())
    }

    #[tokio::test]
    async fn second_begin_is_illegal() {
        let dedup = InlineDedup::new(cache());
        dedup.begin("a").await.unwrap();

        let result = dedup.begin("b").await;
        assert!(matches!(result, Err(CacheError::IllegalState(_))));
    }

    #[tokio::test]
    async fn fresh_then_replay() {
        let handle = cache();

        let first = InlineDedup::new(handle.clone());
        assert!(matches!(first.begin("job").await.unwrap(), DedupGate::Fresh));
        first.complete_ok(json!(42)).await.unwrap();

        let second = InlineDedup::new(handle);
        match second.begin("job").await.unwrap() {
            DedupGate::Replay(CachedOutcome::Value { value }) => assert_eq!(value, json!(42)),
            other => panic!("expected replayed value, got {other:?}"),
        }
        assert_eq!(
            second.short_circuit().await,
            Some(CachedOutcome::value(json!(42)))
        );
    }

    #[tokio::test]
    async fn failures_replay_identically() {
        let handle = cache();

        let first = InlineDedup::new(handle.clone());
        first.begin("job").await.unwrap();
        first.complete_err("quota exceeded").await.unwrap();

        let second = InlineDedup::new(handle);
        match second.begin("job").await.unwrap() {
            DedupGate::Replay(CachedOutcome::Error { message }) => {
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected replayed error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_without_begin_is_noop() {
        let dedup = InlineDedup::new(cache());
        dedup.complete_ok(json!(1)).await.unwrap();
        assert!(!dedup.engaged());
    }

    #[tokio::test]
    async fn replay_ignores_completion() {
        let handle = cache();

        let first = InlineDedup::new(handle.clone());
        first.begin("job").await.unwrap();
        first.complete_ok(json!("original")).await.unwrap();

        let second = InlineDedup::new(handle.clone());
        second.begin("job").await.unwrap();
        second.complete_ok(json!("should not overwrite")).await.unwrap();

        let third = InlineDedup::new(handle);
        match third.begin("job").await.unwrap() {
            DedupGate::Replay(CachedOutcome::Value { value }) => {
                assert_eq!(value, json!("original"));
            }
            other => panic!("expected original value, got {other:?}"),
        }
    }
}
