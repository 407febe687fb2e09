//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`CacheHandle`](crate::CacheHandle).
///
/// Options carry value semantics: merging or cloning never mutates the
/// source. An unset (`None`) field means "inherit from the parent handle";
/// on the root handle it means "no expiry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    /// Time-to-live for successful values.
    pub ttl: Option<Duration>,
    /// Time-to-live for recorded failures.
    pub error_ttl: Option<Duration>,
}

impl CacheOptions {
    /// Create options with a success TTL only.
    #[must_use]
    pub const fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            error_ttl: None,
        }
    }

    /// Merge `overrides` over `self`, producing a new value.
    ///
    /// Set fields in `overrides` win; unset fields inherit from `self`.
    #[must_use]
    pub fn merged(self, overrides: Self) -> Self {
        Self {
            ttl: overrides.ttl.or(self.ttl),
            error_ttl: overrides.error_ttl.or(self.error_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_overrides() {
        let base = CacheOptions {
            ttl: Some(Duration::from_secs(3600)),
            error_ttl: Some(Duration::from_secs(600)),
        };
        let overrides = CacheOptions {
            ttl: Some(Duration::from_secs(60)),
            error_ttl: None,
        };

        let merged = base.merged(overrides);
        assert_eq!(merged.ttl, Some(Duration::from_secs(60)));
        assert_eq!(merged.error_ttl, Some(Duration::from_secs(600)));
    }

    #[test]
    fn merge_does_not_mutate_base() {
        let base = CacheOptions::with_ttl(Duration::from_secs(10));
        let _ = base.merged(CacheOptions::with_ttl(Duration::from_secs(20)));
        assert_eq!(base.ttl, Some(Duration::from_secs(10)));
    }
}
