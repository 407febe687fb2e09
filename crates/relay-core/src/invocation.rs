//! Inbound invocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport-level context the engine passes through untouched.
///
/// The engine never interprets these fields; they exist so handlers can see
/// where a call came from (rate limiting, locale negotiation, logging).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportContext {
    /// Remote peer address, if the transport knows it.
    pub remote_addr: Option<String>,
    /// Selected transport headers.
    pub headers: BTreeMap<String, String>,
}

/// One inbound call into the engine. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// The named action to invoke.
    pub action: String,
    /// Wire-format input payload.
    pub input: Value,
    /// Opaque authenticity token, if the caller presented one.
    #[serde(default)]
    pub signature: Option<String>,
    /// Transport-level context.
    #[serde(default)]
    pub transport: TransportContext,
}

impl Invocation {
    /// Create an unsigned invocation with default transport context.
    #[must_use]
    pub fn new(action: impl Into<String>, input: Value) -> Self {
        Self {
            action: action.into(),
            input,
            signature: None,
            transport: TransportContext::default(),
        }
    }

    /// Attach a signature token.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Attach transport context.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportContext) -> Self {
        self.transport = transport;
        self
    }
}
