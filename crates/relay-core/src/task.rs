//! Serializable descriptors of suspended work.
//!
//! A handler that needs the *caller* to do something (perform a fetch from
//! its own network position, solve a human-verification challenge) returns a
//! [`Task`] instead of a final output. The engine responds with kind
//! `"task"`; the caller performs the work out of band and resubmits it as a
//! reserved `"task"` invocation carrying the [`TaskResult`]. The engine is
//! not a workflow system: a task supports exactly one resumption hop, and
//! its continuation state lives entirely in the cache backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Discriminator value marking an output as a task request.
pub const TASK_REQUEST_KIND: &str = "taskRequest";

/// A deferred fetch the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    /// Absolute URL to fetch.
    pub url: String,
    /// HTTP method; defaults to GET.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Headers to send.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Optional request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl FetchRequest {
    /// A GET request with no headers or body.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// A human-verification challenge the caller must complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Site key identifying the challenge provider configuration.
    pub site_key: String,
    /// Action label forwarded to the challenge provider.
    pub action: String,
}

/// Task-type-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskPayload {
    /// The caller performs an HTTP fetch.
    Fetch(FetchRequest),
    /// The caller completes a recaptcha-style challenge.
    Recaptcha(ChallengeRequest),
}

/// A suspended unit of work, serialized into the response stream.
///
/// The engine recognizes handler output of this shape and classifies the
/// response as kind `"task"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Always [`TASK_REQUEST_KIND`].
    pub kind: String,
    /// Correlates the follow-up `"task"` invocation with this suspension.
    pub id: Uuid,
    /// What the caller must do.
    #[serde(flatten)]
    pub payload: TaskPayload,
}

impl Task {
    /// Create a task with a fresh id.
    #[must_use]
    pub fn new(payload: TaskPayload) -> Self {
        Self {
            kind: TASK_REQUEST_KIND.to_string(),
            id: Uuid::new_v4(),
            payload,
        }
    }

    /// Whether a JSON value is structurally a task request.
    #[must_use]
    pub fn is_task_value(value: &Value) -> bool {
        value.get("kind").and_then(Value::as_str) == Some(TASK_REQUEST_KIND)
    }

    /// Serialize into the response-stream JSON shape.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Handler`](crate::EngineError::Handler) if
    /// serialization fails, which would indicate a malformed payload.
    pub fn to_value(&self) -> crate::EngineResult<Value> {
        serde_json::to_value(self).map_err(|e| crate::EngineError::Handler(e.to_string()))
    }
}

/// The caller-supplied result of a completed task, carried as the input of
/// a reserved `"task"` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// The id of the task being completed.
    pub id: Uuid,
    /// The successful result, if the out-of-band work succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The failure message, if it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a task-backed capability produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The result is available now; continue the handler.
    Ready(Value),
    /// The caller must act; return this task as the handler output.
    Suspended(Task),
}

impl TaskOutcome {
    /// Convert into the value a handler returns: the ready result, or the
    /// serialized task descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Handler`](crate::EngineError::Handler) if a
    /// suspended task fails to serialize.
    pub fn into_output(self) -> crate::EngineResult<Value> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Suspended(task) => task.to_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fetch_task_wire_shape() {
        let task = Task::new(TaskPayload::Fetch(FetchRequest::get(
            "https://example.com/data",
        )));
        let value = task.to_value().unwrap();

        assert_eq!(value["kind"], "taskRequest");
        assert_eq!(value["type"], "fetch");
        assert_eq!(value["url"], "https://example.com/data");
        assert!(Task::is_task_value(&value));

        let parsed: Task = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn recaptcha_task_wire_shape() {
        let task = Task::new(TaskPayload::Recaptcha(ChallengeRequest {
            site_key: "site".to_string(),
            action: "login".to_string(),
        }));
        let value = task.to_value().unwrap();

        assert_eq!(value["type"], "recaptcha");
        assert_eq!(value["siteKey"], "site");
    }

    #[test]
    fn ordinary_outputs_are_not_tasks() {
        assert!(!Task::is_task_value(&json!({"kind": "response"})));
        assert!(!Task::is_task_value(&json!(null)));
        assert!(!Task::is_task_value(&json!({"url": "x"})));
    }

    #[test]
    fn task_result_accepts_result_or_error() {
        let ok: TaskResult =
            serde_json::from_value(json!({"id": Uuid::new_v4(), "result": {"n": 1}})).unwrap();
        assert!(ok.result.is_some());
        assert!(ok.error.is_none());

        let failed: TaskResult =
            serde_json::from_value(json!({"id": Uuid::new_v4(), "error": "timeout"})).unwrap();
        assert!(failed.result.is_none());
        assert_eq!(failed.error.as_deref(), Some("timeout"));
    }
}
