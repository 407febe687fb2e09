//! In-memory cache backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::backend::{CacheBackend, CachedOutcome};
use crate::error::CacheResult;

struct StoredEntry {
    outcome: CachedOutcome,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// DashMap-backed cache with lazy TTL expiry.
///
/// Map operations are atomic per key, which satisfies the per-key
/// linearizability the engine requires. Expired entries are dropped on the
/// next lookup of their key.
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired, not yet reaped) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the backend holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn lookup(&self, key: &str) -> CacheResult<Option<CachedOutcome>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => return Ok(Some(entry.outcome.clone())),
            None => return Ok(None),
        };
        // Guard dropped above; safe to take the write path.
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn store(
        &self,
        key: &str,
        outcome: CachedOutcome,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries
            .insert(key.to_string(), StoredEntry { outcome, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn store_and_lookup() {
        let backend = MemoryBackend::new();
        backend
            .store("k", CachedOutcome::value(json!(42)), None)
            .await
            .unwrap();

        let found = backend.lookup("k").await.unwrap();
        assert_eq!(found, Some(CachedOutcome::value(json!(42))));
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let backend = MemoryBackend::new();
        backend
            .store(
                "k",
                CachedOutcome::value(json!(1)),
                Some(Duration::from_millis(10)),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.lookup("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.remove("missing").await.unwrap();
        backend
            .store("k", CachedOutcome::error("boom"), None)
            .await
            .unwrap();
        backend.remove("k").await.unwrap();
        assert_eq!(backend.lookup("k").await.unwrap(), None);
    }
}
