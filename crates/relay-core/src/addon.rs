//! The addon and handler contracts.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::Capabilities;
use crate::error::{EngineError, EngineResult};

/// Reserved action name for task resumption. MUST NOT be used as a normal
/// handler action: it is routed before handler resolution.
pub const ACTION_TASK: &str = "task";

/// Self-test action; authenticated callers are not required.
pub const ACTION_SELFTEST: &str = "selftest";

/// Addon introspection action; authenticated callers are not required.
pub const ACTION_ADDON: &str = "addon";

/// Repository discovery action; unauthenticated only on repository addons.
pub const ACTION_REPOSITORY: &str = "repository";

/// Resolve action; a null handler result is promoted to "Nothing found".
pub const ACTION_RESOLVE: &str = "resolve";

/// Captcha action; a null handler result is promoted to "Nothing found".
pub const ACTION_CAPTCHA: &str = "captcha";

/// The declared type of an addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonKind {
    /// A self-describing collection of other addons.
    Repository,
    /// A general-purpose action provider.
    Worker,
    /// A bundle of workers shipped as one unit.
    Bundle,
}

impl std::fmt::Display for AddonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repository => write!(f, "repository"),
            Self::Worker => write!(f, "worker"),
            Self::Bundle => write!(f, "bundle"),
        }
    }
}

/// An installed addon: a named bag of action handlers plus metadata.
///
/// Addons are external collaborators; the engine only consumes this
/// interface and never inspects handler internals.
pub trait Addon: Send + Sync {
    /// Stable addon identifier; scopes the addon's cache namespace.
    fn id(&self) -> &str;

    /// The addon's declared kind.
    fn kind(&self) -> AddonKind;

    /// Cheap self-check run before the addon serves invocations.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if the addon is not servable.
    fn validate(&self) -> EngineResult<()> {
        if self.id().is_empty() {
            return Err(EngineError::Validation("addon id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolve the handler for an action.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownAction`] if the addon declares no
    /// handler for `action`.
    fn action_handler(&self, action: &str) -> EngineResult<Arc<dyn ActionHandler>>;

    /// Default cache options merged into every handle derived for this
    /// addon.
    fn default_cache_options(&self) -> relay_cache::CacheOptions {
        relay_cache::CacheOptions::default()
    }
}

/// A handler for one action.
///
/// Handlers receive the migrated input, the capability bundle, and the addon
/// they belong to, and produce the handler-format output (or a task
/// descriptor when they suspend).
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the action.
    ///
    /// # Errors
    ///
    /// Any error aborts the invocation and is reported as a status-500
    /// response; if the dedup capability was engaged, the failure is also
    /// recorded for replay.
    async fn handle(
        &self,
        input: Value,
        caps: Capabilities,
        addon: Arc<dyn Addon>,
    ) -> EngineResult<Value>;
}

/// Adapter turning an async closure into an [`ActionHandler`].
///
/// ```
/// use std::sync::Arc;
///
/// use relay_core::{Addon, Capabilities, EngineResult, FnHandler};
/// use serde_json::Value;
///
/// let handler = FnHandler::new(
///     |input: Value, _caps: Capabilities, _addon: Arc<dyn Addon>| async move {
///         EngineResult::Ok(input)
///     },
/// );
/// # let _ = handler;
/// ```
pub struct FnHandler<F>(F);

impl<F> FnHandler<F> {
    /// Wrap a closure.
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(Value, Capabilities, Arc<dyn Addon>) -> Fut + Send + Sync,
    Fut: Future<Output = EngineResult<Value>> + Send + 'static,
{
    async fn handle(
        &self,
        input: Value,
        caps: Capabilities,
        addon: Arc<dyn Addon>,
    ) -> EngineResult<Value> {
        (self.0)(input, caps, addon).await
    }
}
