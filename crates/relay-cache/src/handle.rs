//! Namespaced cache handles and inline idempotency entries.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::{CacheBackend, CachedOutcome};
use crate::error::CacheResult;
use crate::options::CacheOptions;

/// Root namespace prefix for all engine-managed keys.
const ROOT_PREFIX: &str = "relay";

/// A cheap, cloneable, namespaced view over a [`CacheBackend`].
///
/// A handle does not own storage; it owns a key prefix and a set of
/// [`CacheOptions`]. Deriving a differently-configured handle via
/// [`CacheHandle::with_options`] or a differently-scoped one via
/// [`CacheHandle::scoped`] never mutates the source handle.
#[derive(Clone)]
pub struct CacheHandle {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    options: CacheOptions,
}

impl CacheHandle {
    /// Create a root handle over a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            prefix: ROOT_PREFIX.to_string(),
            options: CacheOptions::default(),
        }
    }

    /// Derive a handle scoped to one addon, with the addon's default
    /// options merged over this handle's options.
    #[must_use]
    pub fn scoped(&self, addon_id: &str, defaults: CacheOptions) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            prefix: format!("{}:addon:{addon_id}", self.prefix),
            options: self.options.merged(defaults),
        }
    }

    /// Derive a handle with `overrides` merged over this handle's options.
    #[must_use]
    pub fn with_options(&self, overrides: CacheOptions) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            prefix: self.prefix.clone(),
            options: self.options.merged(overrides),
        }
    }

    /// The effective options of this handle.
    #[must_use]
    pub fn options(&self) -> CacheOptions {
        self.options
    }

    /// The key prefix of this handle.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }

    /// Get a cached value (successes only; recorded failures read as absent).
    ///
    /// This is the general-purpose cache surface handlers may use for their
    /// own response caching, independent of the inline idempotency below.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        match self.backend.lookup(&self.full_key(key)).await? {
            Some(CachedOutcome::Value { value }) => Ok(Some(value)),
            Some(CachedOutcome::Error { .. }) | None => Ok(None),
        }
    }

    /// Store a value under this handle's success TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn put(&self, key: &str, value: Value) -> CacheResult<()> {
        self.backend
            .store(&self.full_key(key), CachedOutcome::value(value), self.options.ttl)
            .await
    }

    /// Remove a key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        self.backend.remove(&self.full_key(key)).await
    }

    /// Look up the idempotency state for `key`.
    ///
    /// - No prior attempt: [`InlineLookup::Absent`] with an entry the caller
    ///   must complete via [`InlineEntry::set`] or [`InlineEntry::set_error`].
    /// - A prior success: [`InlineLookup::Found`] - do not re-execute.
    /// - A prior failure: [`InlineLookup::FoundError`] - replay the failure.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn inline(&self, key: &str) -> CacheResult<InlineLookup> {
        let full_key = self.full_key(key);
        match self.backend.lookup(&full_key).await? {
            Some(CachedOutcome::Value { value }) => {
                debug!(key = %full_key, "inline cache hit");
                Ok(InlineLookup::Found(value))
            }
            Some(CachedOutcome::Error { message }) => {
                debug!(key = %full_key, "inline cache error hit");
                Ok(InlineLookup::FoundError(message))
            }
            None => Ok(InlineLookup::Absent(InlineEntry {
                backend: Arc::clone(&self.backend),
                key: full_key,
                options: self.options,
            })),
        }
    }

    /// Store a raw outcome under a scoped key. Used by the task subsystem
    /// to satisfy a paired result slot from the resumption path.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn store_outcome(&self, key: &str, outcome: CachedOutcome) -> CacheResult<()> {
        let ttl = match &outcome {
            CachedOutcome::Value { .. } => self.options.ttl,
            CachedOutcome::Error { .. } => self.options.error_ttl,
        };
        self.backend.store(&self.full_key(key), outcome, ttl).await
    }

    /// Look up a raw outcome under a scoped key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn lookup_outcome(&self, key: &str) -> CacheResult<Option<CachedOutcome>> {
        self.backend.lookup(&self.full_key(key)).await
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("prefix", &self.prefix)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The deduplication state of one computation key.
#[derive(Debug)]
pub enum InlineLookup {
    /// No prior attempt; the caller proceeds and must record an outcome.
    Absent(InlineEntry),
    /// A prior attempt succeeded with this value.
    Found(Value),
    /// A prior attempt failed with this message.
    FoundError(String),
}

/// A pending idempotency record for one key.
///
/// Completion methods take `self` by value: an entry is completed at most
/// once by construction. Dropping an entry without completing it leaves the
/// key absent, so a later attempt simply proceeds again.
pub struct InlineEntry {
    backend: Arc<dyn CacheBackend>,
    key: String,
    options: CacheOptions,
}

impl std::fmt::Debug for InlineEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineEntry")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl InlineEntry {
    /// The fully-prefixed key this entry records under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record a successful outcome under the success TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn set(self, value: Value) -> CacheResult<()> {
        self.backend
            .store(&self.key, CachedOutcome::value(value), self.options.ttl)
            .await
    }

    /// Record a failure under the error TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`](crate::CacheError::Backend) if the
    /// backend fails.
    pub async fn set_error(self, message: impl Into<String> + Send) -> CacheResult<()> {
        self.backend
            .store(&self.key, CachedOutcome::error(message), self.options.error_ttl)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use serde_json::json;

    fn handle() -> CacheHandle {
        CacheHandle::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn scoping_isolates_addons() {
        let root = handle();
        let a = root.scoped("addon-a", CacheOptions::default());
        let b = root.scoped("addon-b", CacheOptions::default());

        a.put("k", json!(1)).await.unwrap();
        assert_eq!(a.get("k").await.unwrap(), Some(json!(1)));
        assert_eq!(b.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn with_options_does_not_mutate_parent() {
        let root = handle();
        let child = root.with_options(CacheOptions::with_ttl(std::time::Duration::from_secs(5)));

        assert_eq!(root.options().ttl, None);
        assert_eq!(child.options().ttl, Some(std::time::Duration::from_secs(5)));
        assert_eq!(child.prefix(), root.prefix());
    }

    #[tokio::test]
    async fn inline_found_after_set() {
        let cache = handle().scoped("addon", CacheOptions::default());

        let entry = match cache.inline("job").await.unwrap() {
            InlineLookup::Absent(entry) => entry,
            other => panic!("expected absent, got {other:?}"),
        };
        entry.set(json!("done")).await.unwrap();

        match cache.inline("job").await.unwrap() {
            InlineLookup::Found(value) => assert_eq!(value, json!("done")),
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inline_replays_failures() {
        let cache = handle().scoped("addon", CacheOptions::default());

        match cache.inline("job").await.unwrap() {
            InlineLookup::Absent(entry) => entry.set_error("upstream offline").await.unwrap(),
            other => panic!("expected absent, got {other:?}"),
        }

        match cache.inline("job").await.unwrap() {
            InlineLookup::FoundError(message) => assert_eq!(message, "upstream offline"),
            other => panic!("expected error hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_entry_leaves_key_absent() {
        let cache = handle().scoped("addon", CacheOptions::default());

        match cache.inline("job").await.unwrap() {
            InlineLookup::Absent(entry) => drop(entry),
            other => panic!("expected absent, got {other:?}"),
        }

        assert!(matches!(
            cache.inline("job").await.unwrap(),
            InlineLookup::Absent(_)
        ));
    }
}
