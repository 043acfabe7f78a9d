//! Durable crawl log
//!
//! Every crawl step is recorded as a structured entry through an injected
//! [`LogSink`]. This is a record stream for later inspection, separate from
//! the diagnostic `tracing` output. Appending never fails from the caller's
//! point of view: sinks report their own write problems and carry on.

mod file;

pub use file::FileLogSink;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Destination for structured crawl log entries
pub trait LogSink: Send + Sync {
    /// Appends one entry under `category`
    ///
    /// Must not block on I/O and must not panic on write failures.
    fn append(&self, category: &str, payload: Value);
}

/// A single appended entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub category: String,
    pub recorded_at: DateTime<Utc>,
    pub payload: Value,
}

impl LogEntry {
    pub fn new(category: &str, payload: Value) -> Self {
        Self {
            category: category.to_string(),
            recorded_at: Utc::now(),
            payload,
        }
    }
}

/// Keeps entries in memory
///
/// Used by tests to assert on what a crawl logged.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every entry appended so far, in order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Payloads appended under `category`, in order
    pub fn payloads(&self, category: &str) -> Vec<Value> {
        self.lock()
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, category: &str, payload: Value) {
        self.lock().push(LogEntry::new(category, payload));
    }
}

/// Forwards entries to `tracing`
///
/// The default sink when no log directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, category: &str, payload: Value) {
        info!(target: "trawl::crawl_log", category, "{}", payload);
    }
}
