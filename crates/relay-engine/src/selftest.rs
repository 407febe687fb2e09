//! Addon self-testing.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::info;

use relay_core::{ACTION_SELFTEST, Addon, EngineError, EngineResult, Invocation};

use crate::dispatch::Engine;
use crate::responder::CollectSink;

/// Run the addon's self-test through the full dispatch pipeline.
///
/// Invokes the `selftest` action unsigned (it is auth-exempt) and checks
/// that the addon answers `"ok"` with status 200. Addons without their own
/// selftest handler get the engine's built-in one, so this passes for any
/// healthy addon.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] if the self-test answered anything
/// other than `"ok"`, or the underlying dispatch error.
pub async fn run_selftest(engine: &Engine, addon: Arc<dyn Addon>) -> EngineResult<()> {
    let sink = Arc::new(CollectSink::new());
    engine
        .invoke(
            Arc::clone(&addon),
            Invocation::new(ACTION_SELFTEST, Value::Null),
            sink.clone(),
        )
        .await?;

    let response = sink.take().await.ok_or_else(|| {
        EngineError::IllegalState("self-test produced no response".to_string())
    })?;
    if response.status != 200 || response.payload != json!("ok") {
        return Err(EngineError::Validation(format!(
            "self-test failed for addon '{}': status {}, payload {}",
            addon.id(),
            response.status,
            response.payload
        )));
    }

    info!(addon = %addon.id(), "self-test passed");
    Ok(())
}
