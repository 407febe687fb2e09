//! Request/response recording.
//!
//! When a recording sink is configured, the responder mirrors every
//! completed exchange into it. Nothing is allocated when recording is not
//! configured.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use relay_core::{EngineError, EngineResult};

/// One recorded request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    /// Addon id.
    pub addon: String,
    /// Action name.
    pub action: String,
    /// Wire input as received.
    pub input: Value,
    /// Wire output as sent.
    pub output: Value,
}

/// Destination for recorded exchanges.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails. Recording errors never fail
    /// the invocation; the responder logs them and moves on.
    async fn record(&self, record: ExchangeRecord) -> EngineResult<()>;
}

/// In-memory recorder for tests.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<ExchangeRecord>>,
}

impl MemoryRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the recorded exchanges.
    pub async fn records(&self) -> Vec<ExchangeRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemoryRecorder {
    async fn record(&self, record: ExchangeRecord) -> EngineResult<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// Append-only JSON-lines recorder.
pub struct JsonlRecorder {
    file: Mutex<tokio::fs::File>,
}

impl JsonlRecorder {
    /// Open (or create) the record file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Handler`] if the file cannot be opened.
    pub async fn create(path: impl AsRef<Path>) -> EngineResult<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await
            .map_err(|e| EngineError::Handler(format!("failed to open record file: {e}")))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl std::fmt::Debug for JsonlRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlRecorder").finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordSink for JsonlRecorder {
    async fn record(&self, record: ExchangeRecord) -> EngineResult<()> {
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| EngineError::Handler(format!("failed to serialize record: {e}")))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|e| EngineError::Handler(format!("failed to write record: {e}")))?;
        file.flush()
            .await
            .map_err(|e| EngineError::Handler(format!("failed to flush record: {e}")))?;
        Ok(())
    }
}
