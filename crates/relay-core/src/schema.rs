//! Generic per-action schema validation.
//!
//! When no migration is registered for an action, the engine falls back to
//! the action's schema validator: a pair of request/response transforms that
//! check (and may normalize) wire shapes. The registry itself is an external
//! collaborator - real deployments generate validators from their addon
//! schemas; [`PermissiveSchema`] is the bundled identity implementation.

use std::sync::Arc;

use serde_json::Value;

use crate::addon::AddonKind;
use crate::error::EngineResult;

type Transform = Arc<dyn Fn(Value) -> EngineResult<Value> + Send + Sync>;

/// Request/response transforms for one action's wire shape.
#[derive(Clone)]
pub struct ActionValidator {
    request: Transform,
    response: Transform,
}

impl ActionValidator {
    /// Build a validator from a request and a response transform.
    pub fn new<R, S>(request: R, response: S) -> Self
    where
        R: Fn(Value) -> EngineResult<Value> + Send + Sync + 'static,
        S: Fn(Value) -> EngineResult<Value> + Send + Sync + 'static,
    {
        Self {
            request: Arc::new(request),
            response: Arc::new(response),
        }
    }

    /// A validator that accepts and passes through any shape.
    #[must_use]
    pub fn identity() -> Self {
        Self::new(Ok, Ok)
    }

    /// Validate/normalize a wire input into handler input.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`](crate::EngineError::Validation)
    /// on shape mismatch.
    pub fn request(&self, input: Value) -> EngineResult<Value> {
        (self.request)(input)
    }

    /// Validate/normalize a handler output into wire output.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`](crate::EngineError::Validation)
    /// on shape mismatch.
    pub fn response(&self, output: Value) -> EngineResult<Value> {
        (self.response)(output)
    }
}

impl std::fmt::Debug for ActionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionValidator").finish_non_exhaustive()
    }
}

/// Source of per-action validators, keyed by addon kind and action name.
pub trait SchemaRegistry: Send + Sync {
    /// Resolve the validator for an action.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`](crate::EngineError::Validation)
    /// if the registry cannot provide a validator for this action.
    fn action_validator(&self, kind: AddonKind, action: &str) -> EngineResult<ActionValidator>;
}

/// A registry that hands out identity validators for every action.
///
/// Useful for tests and for embedders that validate at another layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveSchema;

impl SchemaRegistry for PermissiveSchema {
    fn action_validator(&self, _kind: AddonKind, _action: &str) -> EngineResult<ActionValidator> {
        Ok(ActionValidator::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use serde_json::json;

    #[test]
    fn identity_passes_through() {
        let validator = ActionValidator::identity();
        assert_eq!(validator.request(json!({"a": 1})).unwrap(), json!({"a": 1}));
        assert_eq!(validator.response(json!(null)).unwrap(), json!(null));
    }

    #[test]
    fn custom_transforms_run() {
        let validator = ActionValidator::new(
            |input| {
                input
                    .as_object()
                    .map(|_| input.clone())
                    .ok_or_else(|| EngineError::Validation("expected object".to_string()))
            },
            Ok,
        );

        assert!(validator.request(json!({"ok": true})).is_ok());
        assert!(matches!(
            validator.request(json!("not an object")),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn permissive_registry_always_resolves() {
        let registry = PermissiveSchema;
        assert!(registry
            .action_validator(AddonKind::Worker, "anything")
            .is_ok());
    }
}
