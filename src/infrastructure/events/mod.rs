//! Event Sink Implementations
//!
//! Concrete implementations of DeployEventSink:
//! - JsonEventSink: NDJSON output for automation
//! - TracingEventSink: structured log records
//! - FanoutEventSink: several sinks at once

mod json;
mod tracing_sink;

pub use tracing_sink::{FanoutEventSink, TracingEventSink};
pub use json::JsonEventSink;
