//! Relay Engine - the action dispatcher and its collaborators.
//!
//! The engine takes one [`Invocation`](relay_core::Invocation) at a time and
//! guarantees exactly one terminal response per invocation, across four
//! interacting policies:
//!
//! 1. **Authenticity** - signature validation gates which requests reach a
//!    handler, with a fixed exemption set for self-describing actions.
//! 2. **Migration** - per-action adapters translate between wire shapes and
//!    handler shapes, falling back to schema validators.
//! 3. **Idempotency** - the inline dedup capability can short-circuit the
//!    whole pipeline with a previously recorded success or failure.
//! 4. **Task continuation** - a handler may suspend by emitting a task
//!    descriptor; the caller acts on it and resumes via the reserved
//!    `"task"` action, which satisfies the suspended computation's slot.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use relay_core::{AddonKind, EngineConfig, Invocation};
//! use relay_engine::{CollectSink, Engine, StaticAddon};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let engine = Engine::builder()
//!     .config(EngineConfig { skip_signature_check: true, ..EngineConfig::default() })
//!     .build();
//!
//! let addon = Arc::new(
//!     StaticAddon::new("hello", AddonKind::Worker)
//!         .handle_fn("greet", |input, _caps, _addon| async move { Ok(input) }),
//! );
//!
//! let sink = Arc::new(CollectSink::new());
//! engine
//!     .invoke(addon, Invocation::new("greet", serde_json::json!("hi")), sink.clone())
//!     .await
//!     .unwrap();
//! assert_eq!(sink.take().await.unwrap().status, 200);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod dispatch;
mod record;
mod responder;
mod selftest;
mod static_addon;
mod task;

pub use dispatch::{Engine, EngineBuilder};
pub use record::{ExchangeRecord, JsonlRecorder, MemoryRecorder, RecordSink};
pub use responder::{ActionResponse, CollectSink, ExchangeId, Responder, ResponseKind, ResponseSink};
pub use selftest::run_selftest;
pub use static_addon::StaticAddon;
pub use task::{TaskBroker, TaskStub};
