//! Output sinks that mirror recorded entries for live viewing.

use std::sync::{Arc, Mutex, PoisonError};

use crate::level::LogLevel;
use crate::log::LogEntry;

/// Receives every entry the [`DebugLog`](crate::DebugLog) records.
pub trait LogSink: Send + Sync {
    fn emit(&self, entry: &LogEntry);
}

/// Re-emits entries as `tracing` events at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, entry: &LogEntry) {
        let category = entry.category.as_str();
        let data = entry.data.as_ref();
        match entry.level {
            LogLevel::Trace => {
                tracing::trace!(target: "fte::debug", category, ?data, "{}", entry.message)
            }
            LogLevel::Debug => {
                tracing::debug!(target: "fte::debug", category, ?data, "{}", entry.message)
            }
            LogLevel::Info => {
                tracing::info!(target: "fte::debug", category, ?data, "{}", entry.message)
            }
            LogLevel::Warn => {
                tracing::warn!(target: "fte::debug", category, ?data, "{}", entry.message)
            }
            LogLevel::Error => {
                tracing::error!(target: "fte::debug", category, ?data, "{}", entry.message)
            }
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _entry: &LogEntry) {}
}

/// Collects emitted entries in memory. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn emit(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}
