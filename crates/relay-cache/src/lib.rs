//! Relay Cache - cache handles and inline idempotency.
//!
//! This crate provides the caching surface the action engine hands to
//! handlers:
//!
//! - [`CacheBackend`] - the storage contract (per-key linearizable)
//! - [`MemoryBackend`] - the bundled DashMap-based backend with lazy TTL
//! - [`CacheHandle`] - a cheap, cloneable, namespaced view over a backend
//! - [`InlineLookup`] / [`InlineEntry`] - the per-key idempotency primitive
//! - [`InlineDedup`] - the per-invocation guard that enforces "at most one
//!   inline entry per invocation" and carries the short-circuit state
//!
//! # Idempotency
//!
//! Actions that trigger expensive or side-effecting external work must not
//! redo that work when the caller retries the same logical request. A
//! handler asks its [`InlineDedup`] helper to begin work under a key; if a
//! prior attempt already completed, the helper replays the recorded success
//! or failure and the handler never runs its expensive path again.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod backend;
mod dedup;
mod error;
mod handle;
mod memory;
mod options;

pub use backend::{CacheBackend, CachedOutcome};
pub use dedup::{DedupGate, InlineDedup};
pub use error::{CacheError, CacheResult};
pub use handle::{CacheHandle, InlineEntry, InlineLookup};
pub use memory::MemoryBackend;
pub use options::CacheOptions;
