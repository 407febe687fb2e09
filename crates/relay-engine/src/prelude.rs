//! Convenience re-exports for engine embedders.

pub use crate::{
    ActionResponse, CollectSink, Engine, EngineBuilder, ExchangeId, ExchangeRecord, JsonlRecorder,
    MemoryRecorder, RecordSink, Responder, ResponseKind, ResponseSink, StaticAddon, TaskBroker,
    TaskStub, run_selftest,
};

pub use relay_core::prelude::*;
