//! Prelude module - commonly used types for convenient import.
//!
//! Use `use relay_cache::prelude::*;` to import all essential types.

// Errors
pub use crate::{CacheError, CacheResult};

// Storage contract
pub use crate::{CacheBackend, CachedOutcome, MemoryBackend};

// Handles and options
pub use crate::{CacheHandle, CacheOptions};

// Inline idempotency
pub use crate::{DedupGate, InlineDedup, InlineEntry, InlineLookup};
