//! Relay Core - types and contracts for the action-invocation engine.
//!
//! This crate defines the data model the engine crates share:
//!
//! - [`Invocation`] - one inbound call (action, input, signature, transport)
//! - [`Addon`] / [`ActionHandler`] - the plugin contract handlers implement
//! - [`Capabilities`] - the closed capability bundle handed to handlers
//! - [`MigrationRegistry`] - per-action wire/handler shape adapters
//! - [`SchemaRegistry`] / [`ActionValidator`] - the generic validation
//!   fallback when no migration is registered
//! - [`Task`] and friends - serializable descriptors of suspended work
//! - [`EngineError`] - the engine-wide error taxonomy
//! - [`EngineConfig`] - startup-time configuration (auth bypass, test mode)
//!
//! Behavior lives in `relay-engine`; this crate is deliberately thin on
//! logic so embedders can implement the contracts without pulling in the
//! dispatcher.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod addon;
mod capabilities;
mod config;
mod error;
mod invocation;
mod migration;
mod schema;
mod task;

pub use addon::{
    ACTION_ADDON, ACTION_CAPTCHA, ACTION_REPOSITORY, ACTION_RESOLVE, ACTION_SELFTEST, ACTION_TASK,
    ActionHandler, Addon, AddonKind, FnHandler,
};
pub use capabilities::{Capabilities, ChallengeCapability, FetchCapability};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use invocation::{Invocation, TransportContext};
pub use migration::{
    MigrationContext, MigrationEntry, MigrationRegistry, MigrationRegistryBuilder,
};
pub use schema::{ActionValidator, PermissiveSchema, SchemaRegistry};
pub use task::{
    ChallengeRequest, FetchRequest, Task, TaskOutcome, TaskPayload, TaskResult, TASK_REQUEST_KIND,
};
