//! Prelude module - commonly used types for convenient import.
//!
//! Use `use relay_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{EngineError, EngineResult};

// Invocations
pub use crate::{Invocation, TransportContext};

// Addon contract
pub use crate::{ActionHandler, Addon, AddonKind, FnHandler};

// Reserved action names
pub use crate::{
    ACTION_ADDON, ACTION_CAPTCHA, ACTION_REPOSITORY, ACTION_RESOLVE, ACTION_SELFTEST, ACTION_TASK,
};

// Capabilities
pub use crate::{Capabilities, ChallengeCapability, FetchCapability};

// Migrations and schemas
pub use crate::{
    ActionValidator, MigrationContext, MigrationEntry, MigrationRegistry,
    MigrationRegistryBuilder, PermissiveSchema, SchemaRegistry,
};

// Tasks
pub use crate::{ChallengeRequest, FetchRequest, Task, TaskOutcome, TaskPayload, TaskResult};

// Configuration
pub use crate::EngineConfig;
