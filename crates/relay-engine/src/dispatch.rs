//! The invocation dispatcher.
//!
//! [`Engine::invoke`] drives one invocation through a fixed pipeline:
//!
//! 1. Redirect: the reserved `"task"` action resumes a suspended computation
//!    and never reaches authentication or handler resolution.
//! 2. Resolve the handler: an unknown action is fatal before anything else
//!    is checked.
//! 3. Authenticate: validate the signature token, unless the action is in
//!    the exemption set or enforcement is disabled.
//! 4. Migrate the wire input into the handler shape.
//! 5. Run the handler with its capability bundle.
//! 6. Consult the dedup helper: a replayed outcome supersedes whatever the
//!    handler returned.
//! 7. Classify task output, promote null results on lookup actions, migrate
//!    the output back to the wire shape, record the dedup outcome, respond.
//!
//! Whatever happens, exactly one terminal response leaves the responder:
//! pipeline errors that occur before a response was sent become a status-500
//! `{"error": ...}` response.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, error, warn};

use relay_cache::{CacheBackend, CacheHandle, CachedOutcome, InlineDedup, MemoryBackend};
use relay_core::{
    ACTION_ADDON, ACTION_CAPTCHA, ACTION_REPOSITORY, ACTION_RESOLVE, ACTION_SELFTEST, ACTION_TASK,
    Addon, AddonKind, Capabilities, EngineConfig, EngineError, EngineResult, Invocation,
    MigrationContext, MigrationRegistry, PermissiveSchema, SchemaRegistry, Task,
};
use relay_crypto::{TokenValidator, TrustedCaller};

use crate::record::RecordSink;
use crate::responder::{Responder, ResponseKind, ResponseSink};
use crate::task::{TaskBroker, TaskStub, handle_task};

/// The action dispatcher. Built once via [`Engine::builder`] and shared
/// behind an `Arc`; all per-invocation state lives in [`Engine::invoke`].
pub struct Engine {
    config: EngineConfig,
    migrations: Arc<MigrationRegistry>,
    schemas: Arc<dyn SchemaRegistry>,
    root_cache: CacheHandle,
    validator: Option<Arc<TokenValidator>>,
    recorder: Option<Arc<dyn RecordSink>>,
    task_stub: Option<Arc<dyn TaskStub>>,
}

impl Engine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Dispatch one invocation against `addon`, delivering the terminal
    /// response through `sink`.
    ///
    /// Domain failures (authentication, validation, handler errors) are
    /// reported to the caller as a status-500 response and do not surface
    /// here.
    ///
    /// # Errors
    ///
    /// Returns an error only when the invocation cannot be answered at all:
    /// the addon fails its self-check, or the sink refuses delivery.
    pub async fn invoke(
        &self,
        addon: Arc<dyn Addon>,
        invocation: Invocation,
        sink: Arc<dyn ResponseSink>,
    ) -> EngineResult<()> {
        addon.validate()?;

        let responder = Responder::new(
            sink,
            self.recorder.clone(),
            addon.id(),
            &invocation.action,
            invocation.input.clone(),
        );
        let cache = self
            .root_cache
            .scoped(addon.id(), addon.default_cache_options());

        debug!(addon = %addon.id(), action = %invocation.action, "dispatching invocation");

        let result = if invocation.action == ACTION_TASK {
            handle_task(&cache, invocation.input.clone(), &responder).await
        } else {
            self.run_pipeline(&addon, &invocation, &responder, cache)
                .await
        };

        let delivery = match result {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.is_silent() {
                    debug!(addon = %addon.id(), action = %invocation.action, error = %err,
                        "invocation ended without a result");
                } else {
                    error!(addon = %addon.id(), action = %invocation.action, error = %err,
                        "invocation failed");
                }
                if responder.is_sent() {
                    Ok(())
                } else {
                    responder
                        .send(ResponseKind::Response, 500, json!({"error": err.to_string()}))
                        .await
                        .map(|_| ())
                }
            }
        };

        responder.detach().await;
        delivery
    }

    async fn run_pipeline(
        &self,
        addon: &Arc<dyn Addon>,
        invocation: &Invocation,
        responder: &Responder,
        cache: CacheHandle,
    ) -> EngineResult<()> {
        let action = invocation.action.as_str();

        // An unknown action is fatal before the signature or the input shape
        // is looked at. The selftest action answers "ok" even on addons that
        // declare no handler for it.
        let handler = match addon.action_handler(action) {
            Ok(handler) => Some(handler),
            Err(EngineError::UnknownAction(_)) if action == ACTION_SELFTEST => None,
            Err(err) => return Err(err),
        };

        let trusted = self.authenticate(addon.as_ref(), invocation)?;

        let validator = self.schemas.action_validator(addon.kind(), action)?;
        let mut ctx = MigrationContext::new(addon.as_ref(), trusted.clone(), validator);
        let handler_input =
            self.migrations
                .apply_request(action, &mut ctx, invocation.input.clone())?;

        let dedup = Arc::new(InlineDedup::new(cache.clone()));
        // Handler cache use and task slots share the addon's namespace.
        let broker = TaskBroker::new(cache.clone(), self.config.test_mode, self.task_stub.clone());
        let caps = Capabilities {
            transport: invocation.transport.clone(),
            trusted,
            cache,
            dedup: Arc::clone(&dedup),
            fetch: Arc::new(broker.clone()),
            challenge: Arc::new(broker),
        };

        let raw_output = match handler {
            Some(handler) => handler.handle(handler_input.clone(), caps, Arc::clone(addon)).await,
            None => Ok(json!("ok")),
        };

        let result = match raw_output {
            Ok(raw) => {
                self.finish(action, &mut ctx, &handler_input, raw, &dedup, responder)
                    .await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            // Failures replay like successes; no-op unless the handler
            // engaged the dedup capability and the entry is still pending.
            if let Err(record_err) = dedup.complete_err(&err.to_string()).await {
                warn!(error = %record_err, "failed to record invocation failure");
            }
        }
        result
    }

    /// Post-handler stages: short-circuit, task classification, null
    /// promotion, response migration, dedup completion, delivery.
    async fn finish(
        &self,
        action: &str,
        ctx: &mut MigrationContext<'_>,
        handler_input: &Value,
        raw_output: Value,
        dedup: &InlineDedup,
        responder: &Responder,
    ) -> EngineResult<()> {
        // A replayed outcome supersedes whatever the handler returned after
        // observing the gate. Replays are expected results, failures
        // included, so both arms answer here and stay off the error channel.
        if let Some(outcome) = dedup.short_circuit().await {
            let (status, payload) = match outcome {
                CachedOutcome::Value { value } => (200, value),
                CachedOutcome::Error { message } => (500, json!({"error": message})),
            };
            debug!(action, status, "replaying recorded outcome");
            responder
                .send(ResponseKind::Response, status, payload)
                .await?;
            return Ok(());
        }

        // Task descriptors are engine frames, not action payloads; they skip
        // response migration and leave any pending dedup entry unrecorded.
        if Task::is_task_value(&raw_output) {
            responder.send(ResponseKind::Task, 200, raw_output).await?;
            return Ok(());
        }

        if raw_output.is_null() && (action == ACTION_RESOLVE || action == ACTION_CAPTCHA) {
            return Err(EngineError::NothingFound);
        }

        let wire_output = self
            .migrations
            .apply_response(action, ctx, handler_input, raw_output)?;
        dedup.complete_ok(wire_output.clone()).await?;

        responder
            .send(ResponseKind::Response, 200, wire_output)
            .await?;
        Ok(())
    }

    fn authenticate(
        &self,
        addon: &dyn Addon,
        invocation: &Invocation,
    ) -> EngineResult<Option<TrustedCaller>> {
        if self.config.skip_signature_check || Self::auth_exempt(addon, &invocation.action) {
            return Ok(None);
        }

        let raw = invocation.signature.as_deref().ok_or_else(|| {
            EngineError::Authentication(format!(
                "action '{}' requires a signed invocation",
                invocation.action
            ))
        })?;
        let validator = self.validator.as_ref().ok_or_else(|| {
            EngineError::Authentication("no trusted issuer keys configured".to_string())
        })?;

        let trusted = validator
            .validate(raw)
            .map_err(|err| EngineError::Authentication(err.to_string()))?;
        debug!(user = %trusted.user, "invocation authenticated");
        Ok(Some(trusted))
    }

    /// Actions that must work for callers who cannot sign yet: discovery and
    /// self-description.
    fn auth_exempt(addon: &dyn Addon, action: &str) -> bool {
        match action {
            ACTION_SELFTEST | ACTION_ADDON => true,
            ACTION_REPOSITORY => addon.kind() == AddonKind::Repository,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("migrations", &self.migrations)
            .field("signature_enforced", &self.validator.is_some())
            .field("recording", &self.recorder.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`]. Defaults: strict config, empty migration
/// registry, permissive schemas, in-memory cache, no trusted issuer keys,
/// no recording, no task stub.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    migrations: MigrationRegistry,
    schemas: Option<Arc<dyn SchemaRegistry>>,
    backend: Option<Arc<dyn CacheBackend>>,
    validator: Option<Arc<TokenValidator>>,
    recorder: Option<Arc<dyn RecordSink>>,
    task_stub: Option<Arc<dyn TaskStub>>,
}

impl EngineBuilder {
    /// Set the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the per-action migration registry.
    #[must_use]
    pub fn migrations(mut self, migrations: MigrationRegistry) -> Self {
        self.migrations = migrations;
        self
    }

    /// Install the schema registry used when no migration is registered.
    #[must_use]
    pub fn schemas(mut self, schemas: Arc<dyn SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Use a specific cache backend instead of the in-memory default.
    #[must_use]
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Install the token validator holding the trusted issuer keys.
    #[must_use]
    pub fn token_validator(mut self, validator: TokenValidator) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Mirror every completed exchange into `recorder`.
    #[must_use]
    pub fn recorder(mut self, recorder: Arc<dyn RecordSink>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Answer task capabilities from `stub` when test mode is enabled.
    #[must_use]
    pub fn task_stub(mut self, stub: Arc<dyn TaskStub>) -> Self {
        self.task_stub = Some(stub);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Engine {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        Engine {
            config: self.config,
            migrations: Arc::new(self.migrations),
            schemas: self.schemas.unwrap_or_else(|| Arc::new(PermissiveSchema)),
            root_cache: CacheHandle::new(backend),
            validator: self.validator,
            recorder: self.recorder,
            task_stub: self.task_stub,
        }
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
