//! Per-action wire/handler shape migrations.
//!
//! Older clients speak older wire shapes. A [`MigrationEntry`] adapts one
//! action bidirectionally: its request adapter turns whatever arrived on the
//! wire into the shape the current handler expects, and its response adapter
//! turns the handler's output back into the shape that caller understands.
//! Adapters for the same invocation share a [`MigrationContext`], so the
//! request phase can note which wire version it saw and the response phase
//! can answer in kind.
//!
//! Registered migrations are process-wide, read-only configuration: build
//! the registry once at startup with [`MigrationRegistryBuilder`] and inject
//! it into the engine. An action without an entry falls back to its schema
//! validator's transforms, with no blending between the two paths.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::addon::Addon;
use crate::error::EngineResult;
use crate::schema::ActionValidator;
use relay_crypto::TrustedCaller;

/// Per-invocation scratch shared between an action's two adapter calls.
///
/// Owned exclusively by one invocation; handed by mutable reference only to
/// the request and response adapters of that invocation.
pub struct MigrationContext<'a> {
    /// The addon being invoked.
    pub addon: &'a dyn Addon,
    /// Adapter scratch space, empty at the start of the invocation.
    pub data: Map<String, Value>,
    /// Trusted signature data, when the invocation was authenticated.
    pub trusted: Option<TrustedCaller>,
    /// The action's schema validator (also the fallback transform source).
    pub validator: ActionValidator,
}

impl<'a> MigrationContext<'a> {
    /// Create a fresh context for one invocation.
    #[must_use]
    pub fn new(
        addon: &'a dyn Addon,
        trusted: Option<TrustedCaller>,
        validator: ActionValidator,
    ) -> Self {
        Self {
            addon,
            data: Map::new(),
            trusted,
            validator,
        }
    }
}

impl std::fmt::Debug for MigrationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("addon", &self.addon.id())
            .field("data", &self.data)
            .field("trusted", &self.trusted)
            .finish_non_exhaustive()
    }
}

type RequestAdapter =
    Arc<dyn Fn(&mut MigrationContext<'_>, Value) -> EngineResult<Value> + Send + Sync>;
type ResponseAdapter =
    Arc<dyn Fn(&mut MigrationContext<'_>, &Value, Value) -> EngineResult<Value> + Send + Sync>;

/// Bidirectional adapter for one action.
#[derive(Clone)]
pub struct MigrationEntry {
    action: String,
    request: RequestAdapter,
    response: ResponseAdapter,
}

impl MigrationEntry {
    /// Build an entry from a request and a response adapter.
    ///
    /// The request adapter receives `(ctx, wire_input)` and produces handler
    /// input; the response adapter receives `(ctx, handler_input,
    /// handler_output)` and produces wire output.
    pub fn new<R, S>(action: impl Into<String>, request: R, response: S) -> Self
    where
        R: Fn(&mut MigrationContext<'_>, Value) -> EngineResult<Value> + Send + Sync + 'static,
        S: Fn(&mut MigrationContext<'_>, &Value, Value) -> EngineResult<Value>
            + Send
            + Sync
            + 'static,
    {
        Self {
            action: action.into(),
            request: Arc::new(request),
            response: Arc::new(response),
        }
    }

    /// The action this entry adapts.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl std::fmt::Debug for MigrationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEntry")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Immutable mapping of action name to migration entry.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    entries: HashMap<String, MigrationEntry>,
}

impl MigrationRegistry {
    /// An empty registry: every action falls back to its schema validator.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a registry.
    #[must_use]
    pub fn builder() -> MigrationRegistryBuilder {
        MigrationRegistryBuilder::default()
    }

    /// Whether an entry is registered for `action`.
    #[must_use]
    pub fn has_entry(&self, action: &str) -> bool {
        self.entries.contains_key(action)
    }

    /// Transform wire input into handler input.
    ///
    /// A registered entry takes precedence; otherwise the context's schema
    /// validator transforms the input directly.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`](crate::EngineError::Validation)
    /// (or whatever the adapter raises) on malformed input.
    pub fn apply_request(
        &self,
        action: &str,
        ctx: &mut MigrationContext<'_>,
        input: Value,
    ) -> EngineResult<Value> {
        match self.entries.get(action) {
            Some(entry) => (entry.request)(ctx, input),
            None => ctx.validator.request(input),
        }
    }

    /// Transform handler output into wire output.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`](crate::EngineError::Validation)
    /// (or whatever the adapter raises) on malformed output.
    pub fn apply_response(
        &self,
        action: &str,
        ctx: &mut MigrationContext<'_>,
        handler_input: &Value,
        output: Value,
    ) -> EngineResult<Value> {
        match self.entries.get(action) {
            Some(entry) => (entry.response)(ctx, handler_input, output),
            None => ctx.validator.response(output),
        }
    }
}

/// Builder for [`MigrationRegistry`]; consumed at startup.
#[derive(Debug, Default)]
pub struct MigrationRegistryBuilder {
    entries: HashMap<String, MigrationEntry>,
}

impl MigrationRegistryBuilder {
    /// Register an entry. A later entry for the same action replaces the
    /// earlier one.
    #[must_use]
    pub fn register(mut self, entry: MigrationEntry) -> Self {
        self.entries.insert(entry.action().to_string(), entry);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> MigrationRegistry {
        MigrationRegistry {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::{ActionHandler, AddonKind};
    use crate::error::EngineError;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    struct BareAddon;

    impl Addon for BareAddon {
        fn id(&self) -> &str {
            "bare"
        }

        fn kind(&self) -> AddonKind {
            AddonKind::Worker
        }

        fn action_handler(&self, action: &str) -> EngineResult<StdArc<dyn ActionHandler>> {
            Err(EngineError::UnknownAction(action.to_string()))
        }
    }

    fn ctx(validator: ActionValidator) -> MigrationContext<'static> {
        static ADDON: BareAddon = BareAddon;
        MigrationContext::new(&ADDON, None, validator)
    }

    #[test]
    fn falls_back_to_validator_when_unregistered() {
        let registry = MigrationRegistry::empty();
        let validator = ActionValidator::new(
            |_| Ok(json!("validated request")),
            |_| Ok(json!("validated response")),
        );
        let mut ctx = ctx(validator);

        let input = registry
            .apply_request("anything", &mut ctx, json!({}))
            .unwrap();
        assert_eq!(input, json!("validated request"));

        let output = registry
            .apply_response("anything", &mut ctx, &input, json!({}))
            .unwrap();
        assert_eq!(output, json!("validated response"));
    }

    #[test]
    fn registered_entry_takes_precedence() {
        let registry = MigrationRegistry::builder()
            .register(MigrationEntry::new(
                "resolve",
                |_, _| Ok(json!("migrated request")),
                |_, _, _| Ok(json!("migrated response")),
            ))
            .build();
        // A validator that would fail if the fallback ran.
        let validator = ActionValidator::new(
            |_| Err(EngineError::Validation("fallback ran".to_string())),
            |_| Err(EngineError::Validation("fallback ran".to_string())),
        );
        let mut ctx = ctx(validator);

        let input = registry
            .apply_request("resolve", &mut ctx, json!({}))
            .unwrap();
        assert_eq!(input, json!("migrated request"));
        let output = registry
            .apply_response("resolve", &mut ctx, &input, json!({}))
            .unwrap();
        assert_eq!(output, json!("migrated response"));
    }

    #[test]
    fn context_data_flows_between_phases() {
        let registry = MigrationRegistry::builder()
            .register(MigrationEntry::new(
                "directory",
                |ctx, input| {
                    let version = input
                        .get("apiVersion")
                        .cloned()
                        .unwrap_or_else(|| json!(1));
                    ctx.data.insert("apiVersion".to_string(), version);
                    Ok(input)
                },
                |ctx, _request, output| {
                    let version = ctx.data.get("apiVersion").cloned().unwrap_or(json!(1));
                    Ok(json!({"apiVersion": version, "body": output}))
                },
            ))
            .build();
        let mut ctx = ctx(ActionValidator::identity());

        let input = registry
            .apply_request("directory", &mut ctx, json!({"apiVersion": 2}))
            .unwrap();
        let output = registry
            .apply_response("directory", &mut ctx, &input, json!(["item"]))
            .unwrap();
        assert_eq!(output, json!({"apiVersion": 2, "body": ["item"]}));
    }
}
