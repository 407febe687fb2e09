//! Task brokering: suspension, pairing, and resumption.
//!
//! The broker implements the fetch and challenge capabilities. Each
//! suspendable request is paired with a *result slot* in the addon's cache,
//! keyed by a content hash of the request itself, so a re-invoked action
//! finds the result of its own earlier suspension deterministically. A
//! separate *task record* maps the task id (the only thing the caller
//! echoes back) to that slot.
//!
//! Lifecycle:
//!
//! 1. First pass: slot absent - the broker stores a task record and returns
//!    a suspended [`Task`]; the handler returns it as output and the engine
//!    responds with kind `"task"`.
//! 2. The caller performs the work and resubmits it as a `"task"`
//!    invocation; [`handle_task`] writes the result into the paired slot
//!    and removes the record.
//! 3. Second pass: the re-invoked action's capability finds the slot
//!    populated and returns the value synchronously.
//!
//! The record carries its own TTL; an abandoned task simply ages out of the
//! cache backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use relay_cache::{CacheHandle, CacheOptions, CachedOutcome};
use relay_core::{
    ChallengeCapability, ChallengeRequest, EngineError, EngineResult, FetchCapability,
    FetchRequest, Task, TaskOutcome, TaskPayload, TaskResult,
};
use relay_crypto::ContentHash;

use crate::responder::{Responder, ResponseKind};

/// How long a task record waits for its caller to come back.
const TASK_RECORD_TTL: Duration = Duration::from_secs(15 * 60);

/// Synchronous stand-in for task capabilities in test mode.
///
/// Self-tests and recorded replays must be deterministic and side-effect
/// free, so in test mode the broker asks a stub instead of suspending.
#[async_trait]
pub trait TaskStub: Send + Sync {
    /// Produce the result a real caller-side fetch would have delivered.
    ///
    /// # Errors
    ///
    /// Returns whatever error the stub wants the handler to observe.
    async fn fetch(&self, request: FetchRequest) -> EngineResult<Value>;

    /// Produce a completed challenge token.
    ///
    /// # Errors
    ///
    /// Returns whatever error the stub wants the handler to observe.
    async fn challenge(&self, request: ChallengeRequest) -> EngineResult<Value>;
}

/// The task capability implementation bound to one invocation's cache.
#[derive(Clone)]
pub struct TaskBroker {
    cache: CacheHandle,
    test_mode: bool,
    stub: Option<Arc<dyn TaskStub>>,
}

impl TaskBroker {
    /// Create a broker over the invocation's scoped cache handle.
    #[must_use]
    pub fn new(cache: CacheHandle, test_mode: bool, stub: Option<Arc<dyn TaskStub>>) -> Self {
        Self {
            cache,
            test_mode,
            stub,
        }
    }

    fn slot_key(payload: &TaskPayload) -> EngineResult<String> {
        let canonical =
            serde_json::to_value(payload).map_err(|e| EngineError::Handler(e.to_string()))?;
        let hash = ContentHash::hash_json(&canonical)
            .map_err(|e| EngineError::Handler(e.to_string()))?;
        Ok(format!("task.slot:{}", hash.to_hex()))
    }

    fn record_key(id: Uuid) -> String {
        format!("task.record:{id}")
    }

    async fn resolve(&self, payload: TaskPayload) -> EngineResult<TaskOutcome> {
        if self.test_mode {
            let stub = self.stub.as_ref().ok_or_else(|| {
                EngineError::IllegalState(
                    "test mode requires a task stub to answer capability calls".to_string(),
                )
            })?;
            let value = match payload {
                TaskPayload::Fetch(request) => stub.fetch(request).await?,
                TaskPayload::Recaptcha(request) => stub.challenge(request).await?,
            };
            return Ok(TaskOutcome::Ready(value));
        }

        let slot_key = Self::slot_key(&payload)?;
        match self.cache.lookup_outcome(&slot_key).await? {
            Some(CachedOutcome::Value { value }) => {
                debug!(slot = %slot_key, "task slot satisfied; resuming");
                Ok(TaskOutcome::Ready(value))
            }
            Some(CachedOutcome::Error { message }) => {
                debug!(slot = %slot_key, "task slot recorded a failure");
                Err(EngineError::Handler(message))
            }
            None => {
                let task = Task::new(payload);
                let record = CachedOutcome::value(json!({ "slot": slot_key }));
                self.cache
                    .with_options(CacheOptions {
                        ttl: Some(TASK_RECORD_TTL),
                        error_ttl: Some(TASK_RECORD_TTL),
                    })
                    .store_outcome(&Self::record_key(task.id), record)
                    .await?;
                debug!(task_id = %task.id, slot = %slot_key, "suspending on task");
                Ok(TaskOutcome::Suspended(task))
            }
        }
    }
}

impl std::fmt::Debug for TaskBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskBroker")
            .field("cache", &self.cache)
            .field("test_mode", &self.test_mode)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FetchCapability for TaskBroker {
    async fn fetch(&self, request: FetchRequest) -> EngineResult<TaskOutcome> {
        self.resolve(TaskPayload::Fetch(request)).await
    }
}

#[async_trait]
impl ChallengeCapability for TaskBroker {
    async fn challenge(&self, request: ChallengeRequest) -> EngineResult<TaskOutcome> {
        self.resolve(TaskPayload::Recaptcha(request)).await
    }
}

/// Complete a suspended computation from a `"task"` invocation.
///
/// Looks up the task record, writes the caller-delivered result (or error)
/// into the paired slot, removes the record, and acknowledges with a plain
/// `{"ok": true}` response. This path never touches authentication,
/// migration, or handler resolution.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for a malformed task result and
/// [`EngineError::Handler`] for an unknown or expired task id; the engine
/// converts either into the standard status-500 error response.
pub(crate) async fn handle_task(
    cache: &CacheHandle,
    input: Value,
    responder: &Responder,
) -> EngineResult<()> {
    let result: TaskResult = serde_json::from_value(input)
        .map_err(|e| EngineError::Validation(format!("malformed task result: {e}")))?;

    let record_key = TaskBroker::record_key(result.id);
    let record = match cache.lookup_outcome(&record_key).await? {
        Some(CachedOutcome::Value { value }) => value,
        Some(CachedOutcome::Error { .. }) | None => {
            return Err(EngineError::Handler("task not found".to_string()));
        }
    };
    let slot_key = record
        .get("slot")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Handler("corrupt task record".to_string()))?;

    let outcome = match (result.result, result.error) {
        (Some(value), _) => CachedOutcome::value(value),
        (None, Some(message)) => CachedOutcome::error(message),
        (None, None) => {
            return Err(EngineError::Validation(
                "task result carries neither result nor error".to_string(),
            ));
        }
    };

    cache.store_outcome(slot_key, outcome).await?;
    cache.remove(&record_key).await?;
    debug!(task_id = %result.id, slot = %slot_key, "task slot satisfied by caller");

    responder
        .send(ResponseKind::Response, 200, json!({ "ok": true }))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_cache::MemoryBackend;

    fn cache() -> CacheHandle {
        CacheHandle::new(Arc::new(MemoryBackend::new())).scoped("addon", CacheOptions::default())
    }

    struct EchoStub;

    #[async_trait]
    impl TaskStub for EchoStub {
        async fn fetch(&self, request: FetchRequest) -> EngineResult<Value> {
            Ok(json!({ "fetched": request.url }))
        }

        async fn challenge(&self, request: ChallengeRequest) -> EngineResult<Value> {
            Ok(json!({ "token": request.site_key }))
        }
    }

    #[tokio::test]
    async fn first_fetch_suspends_with_record() {
        let cache = cache();
        let broker = TaskBroker::new(cache.clone(), false, None);

        let outcome = broker
            .fetch(FetchRequest::get("https://example.com"))
            .await
            .unwrap();
        let task = match outcome {
            TaskOutcome::Suspended(task) => task,
            TaskOutcome::Ready(value) => panic!("expected suspension, got {value}"),
        };

        let record = cache
            .lookup_outcome(&TaskBroker::record_key(task.id))
            .await
            .unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn identical_requests_share_a_slot() {
        let broker = TaskBroker::new(cache(), false, None);

        let a = TaskBroker::slot_key(&TaskPayload::Fetch(FetchRequest::get("https://x"))).unwrap();
        let b = TaskBroker::slot_key(&TaskPayload::Fetch(FetchRequest::get("https://x"))).unwrap();
        let c = TaskBroker::slot_key(&TaskPayload::Fetch(FetchRequest::get("https://y"))).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        drop(broker);
    }

    #[tokio::test]
    async fn satisfied_slot_resumes_synchronously() {
        let cache = cache();
        let broker = TaskBroker::new(cache.clone(), false, None);
        let request = FetchRequest::get("https://example.com/data");

        // Suspend once, then satisfy the slot directly.
        let slot = TaskBroker::slot_key(&TaskPayload::Fetch(request.clone())).unwrap();
        broker.fetch(request.clone()).await.unwrap();
        cache
            .store_outcome(&slot, CachedOutcome::value(json!({"body": "hello"})))
            .await
            .unwrap();

        match broker.fetch(request).await.unwrap() {
            TaskOutcome::Ready(value) => assert_eq!(value, json!({"body": "hello"})),
            TaskOutcome::Suspended(task) => panic!("expected resumption, got task {}", task.id),
        }
    }

    #[tokio::test]
    async fn recorded_slot_failure_surfaces_as_handler_error() {
        let cache = cache();
        let broker = TaskBroker::new(cache.clone(), false, None);
        let request = FetchRequest::get("https://example.com/broken");

        let slot = TaskBroker::slot_key(&TaskPayload::Fetch(request.clone())).unwrap();
        cache
            .store_outcome(&slot, CachedOutcome::error("origin returned 503"))
            .await
            .unwrap();

        let err = broker.fetch(request).await.unwrap_err();
        assert!(matches!(err, EngineError::Handler(message) if message == "origin returned 503"));
    }

    #[tokio::test]
    async fn test_mode_answers_from_stub_without_cache_writes() {
        let cache = cache();
        let broker = TaskBroker::new(cache.clone(), true, Some(Arc::new(EchoStub)));
        let request = FetchRequest::get("https://example.com");

        match broker.fetch(request.clone()).await.unwrap() {
            TaskOutcome::Ready(value) => assert_eq!(value["fetched"], "https://example.com"),
            TaskOutcome::Suspended(_) => panic!("test mode must not suspend"),
        }

        let slot = TaskBroker::slot_key(&TaskPayload::Fetch(request)).unwrap();
        assert!(cache.lookup_outcome(&slot).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mode_without_stub_is_illegal() {
        let broker = TaskBroker::new(cache(), true, None);
        let err = broker
            .fetch(FetchRequest::get("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalState(_)));
    }
}
