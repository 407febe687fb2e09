//! A fixed-table [`Addon`] implementation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use relay_cache::CacheOptions;
use relay_core::{
    ACTION_TASK, ActionHandler, Addon, AddonKind, Capabilities, EngineError, EngineResult,
    FnHandler,
};

/// An addon whose handler table is fixed at construction time.
///
/// Covers the common case of an addon assembled in code; dynamic addons
/// implement [`Addon`] directly.
pub struct StaticAddon {
    id: String,
    kind: AddonKind,
    cache_options: CacheOptions,
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl StaticAddon {
    /// Create an addon with an empty handler table.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: AddonKind) -> Self {
        Self {
            id: id.into(),
            kind,
            cache_options: CacheOptions::default(),
            handlers: HashMap::new(),
        }
    }

    /// Set the default cache options for handles derived for this addon.
    #[must_use]
    pub fn with_cache_options(mut self, options: CacheOptions) -> Self {
        self.cache_options = options;
        self
    }

    /// Register a handler for `action`. A later handler for the same action
    /// replaces the earlier one.
    #[must_use]
    pub fn handler(mut self, action: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(action.into(), handler);
        self
    }

    /// Register an async closure as the handler for `action`.
    #[must_use]
    pub fn handle_fn<F, Fut>(self, action: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, Capabilities, Arc<dyn Addon>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<Value>> + Send + 'static,
    {
        self.handler(action, Arc::new(FnHandler::new(f)))
    }
}

impl Addon for StaticAddon {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AddonKind {
        self.kind
    }

    fn validate(&self) -> EngineResult<()> {
        if self.id.is_empty() {
            return Err(EngineError::Validation(
                "addon id must not be empty".to_string(),
            ));
        }
        if self.handlers.contains_key(ACTION_TASK) {
            return Err(EngineError::Validation(format!(
                "'{ACTION_TASK}' is reserved and cannot carry a handler"
            )));
        }
        Ok(())
    }

    fn action_handler(&self, action: &str) -> EngineResult<Arc<dyn ActionHandler>> {
        self.handlers
            .get(action)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAction(action.to_string()))
    }

    fn default_cache_options(&self) -> CacheOptions {
        self.cache_options
    }
}

impl std::fmt::Debug for StaticAddon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAddon")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("actions", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_registered_handlers() {
        let addon = StaticAddon::new("demo", AddonKind::Worker)
            .handle_fn("echo", |input, _caps, _addon| async move { Ok(input) });

        assert!(addon.action_handler("echo").is_ok());
        assert!(matches!(
            addon.action_handler("missing"),
            Err(EngineError::UnknownAction(_))
        ));
    }

    #[test]
    fn reserved_task_action_fails_validation() {
        let addon = StaticAddon::new("demo", AddonKind::Worker)
            .handle_fn("task", |_input, _caps, _addon| async move { Ok(json!(null)) });

        assert!(matches!(addon.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn empty_id_fails_validation() {
        let addon = StaticAddon::new("", AddonKind::Worker);
        assert!(matches!(addon.validate(), Err(EngineError::Validation(_))));
    }
}
