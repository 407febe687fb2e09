//! Exactly-once response delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use relay_core::{EngineError, EngineResult};

use crate::record::{ExchangeRecord, RecordSink};

/// Classification of a terminal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// A final action result.
    Response,
    /// A task descriptor the caller must act on and resubmit.
    Task,
}

/// The single terminal response of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Response classification.
    pub kind: ResponseKind,
    /// HTTP-style status code (200 success, 500 failure).
    pub status: u16,
    /// Wire payload.
    pub payload: Value,
}

/// Identifier of one completed request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(pub Uuid);

impl ExchangeId {
    /// Create a fresh exchange id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exchange:{}", &self.0.to_string()[..8])
    }
}

/// Delivery channel for terminal responses (the transport boundary).
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Deliver the response to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails; the engine surfaces this to its
    /// own caller since nothing else can be done for the invocation.
    async fn deliver(&self, response: ActionResponse) -> EngineResult<()>;
}

/// A [`ResponseSink`] that captures the single response in memory.
///
/// Used by tests and by [`run_selftest`](crate::run_selftest).
#[derive(Debug, Default)]
pub struct CollectSink {
    slot: Mutex<Option<ActionResponse>>,
}

impl CollectSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the captured response, if one was delivered.
    pub async fn take(&self) -> Option<ActionResponse> {
        self.slot.lock().await.take()
    }
}

#[async_trait]
impl ResponseSink for CollectSink {
    async fn deliver(&self, response: ActionResponse) -> EngineResult<()> {
        *self.slot.lock().await = Some(response);
        Ok(())
    }
}

/// Guarantees exactly one terminal send per invocation.
///
/// Created per invocation. After the dispatcher finishes it calls
/// [`Responder::detach`], dropping the sink reference so a stale clone of
/// the responder cannot deliver anything later. That detachment is a
/// defensive closure step, not part of the response protocol.
pub struct Responder {
    sink: Mutex<Option<Arc<dyn ResponseSink>>>,
    sent: AtomicBool,
    recorder: Option<Arc<dyn RecordSink>>,
    addon_id: String,
    action: String,
    input: Value,
}

impl Responder {
    /// Create a responder for one invocation.
    #[must_use]
    pub fn new(
        sink: Arc<dyn ResponseSink>,
        recorder: Option<Arc<dyn RecordSink>>,
        addon_id: impl Into<String>,
        action: impl Into<String>,
        input: Value,
    ) -> Self {
        Self {
            sink: Mutex::new(Some(sink)),
            sent: AtomicBool::new(false),
            recorder,
            addon_id: addon_id.into(),
            action: action.into(),
            input,
        }
    }

    /// Whether the terminal response has been sent.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    /// Deliver the terminal response.
    ///
    /// When a recording sink is configured, the exchange is mirrored into it
    /// after delivery; recording failures are logged and do not fail the
    /// invocation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalState`] on a second send or after
    /// [`Responder::detach`], or the sink's own delivery error. A failed
    /// delivery leaves the responder unsent, so the caller may still answer
    /// the invocation through another attempt.
    pub async fn send(
        &self,
        kind: ResponseKind,
        status: u16,
        payload: Value,
    ) -> EngineResult<ExchangeId> {
        if self.sent.swap(true, Ordering::SeqCst) {
            return Err(EngineError::IllegalState(
                "response already sent for this invocation".to_string(),
            ));
        }

        let sink = self
            .sink
            .lock()
            .await
            .clone()
            .ok_or_else(|| EngineError::IllegalState("responder is detached".to_string()))?;

        if let Err(err) = sink
            .deliver(ActionResponse {
                kind,
                status,
                payload: payload.clone(),
            })
            .await
        {
            // Nothing reached the caller; the invocation still owes its one
            // response, so the responder stays unsent.
            self.sent.store(false, Ordering::SeqCst);
            return Err(err);
        }

        if let Some(recorder) = &self.recorder {
            let record = ExchangeRecord {
                addon: self.addon_id.clone(),
                action: self.action.clone(),
                input: self.input.clone(),
                output: payload,
            };
            if let Err(err) = recorder.record(record).await {
                warn!(error = %err, addon = %self.addon_id, action = %self.action,
                    "request recording failed");
            }
        }

        Ok(ExchangeId::new())
    }

    /// Drop the delivery channel so nothing further can be sent.
    pub async fn detach(&self) {
        *self.sink.lock().await = None;
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("addon_id", &self.addon_id)
            .field("action", &self.action)
            .field("sent", &self.is_sent())
            .finish_non_exhaustive()
    }
}
