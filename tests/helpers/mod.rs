#![allow(dead_code)]
//! Shared setup for integration tests.

use herald::formatting::FormatFlags;
use herald::testing::SharedBuffer;
use herald::{Lifecycle, Logger};

/// A logger with no header fields, writing into `buffer`.
pub fn buffered_logger(buffer: &SharedBuffer, prefix: &str) -> Logger {
    Logger::builder()
        .output(buffer.clone())
        .prefix(prefix)
        .flags(FormatFlags::none())
        .build(Lifecycle::new())
}

/// Builds a sink entry the way it appears after parsing a `[[sinks]]` table.
pub fn sink_entry(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("sink entries are objects, got {}", other),
    }
}
