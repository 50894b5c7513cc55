//! The debug log facility.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::buffer::RingBuffer;
use crate::level::LogLevel;
use crate::sink::{LogSink, TracingSink};

/// Default number of entries kept in memory.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Category used by the WebSocket helpers.
pub const WS_CATEGORY: &str = "WebSocket";

/// A single recorded log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Direction of a logged WebSocket message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }
}

/// Initial settings of a [`DebugLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugLogConfig {
    /// Ring buffer size; zero is treated as one.
    pub capacity: usize,
    pub level: LogLevel,
    pub enabled: bool,
}

impl DebugLogConfig {
    /// Debug mode records everything from DEBUG up; otherwise the log is
    /// off with an INFO floor ready for when it gets enabled at runtime.
    pub fn from_debug_mode(debug_mode: bool) -> Self {
        if debug_mode {
            Self {
                capacity: DEFAULT_CAPACITY,
                level: LogLevel::Debug,
                enabled: true,
            }
        } else {
            Self {
                capacity: DEFAULT_CAPACITY,
                level: LogLevel::Info,
                enabled: false,
            }
        }
    }
}

impl Default for DebugLogConfig {
    fn default() -> Self {
        Self::from_debug_mode(false)
    }
}

/// Record shape produced by [`DebugLog::export_logs`].
#[derive(Serialize)]
struct ExportRecord<'a> {
    time: String,
    level: LogLevel,
    category: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

#[derive(Debug)]
struct State {
    logs: RingBuffer<LogEntry>,
    level: LogLevel,
    enabled: bool,
}

/// Leveled, categorized, ring-buffered log.
///
/// Cheap to clone; clones share the same buffer and settings.
#[derive(Clone)]
pub struct DebugLog {
    state: Arc<Mutex<State>>,
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for DebugLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("DebugLog")
            .field("len", &state.logs.len())
            .field("capacity", &state.logs.capacity())
            .field("level", &state.level)
            .field("enabled", &state.enabled)
            .finish()
    }
}

impl DebugLog {
    /// Creates a log that mirrors entries to `tracing`.
    pub fn new(config: DebugLogConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Creates a log mirroring entries to the given sink.
    ///
    /// A zero `config.capacity` is raised to one.
    pub fn with_sink(config: DebugLogConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                logs: RingBuffer::new(config.capacity.max(1)),
                level: config.level,
                enabled: config.enabled,
            })),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records an entry if the log is enabled and `level` is at or above the floor.
    pub fn log(
        &self,
        level: LogLevel,
        category: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let entry = {
            let mut state = self.lock();
            if !state.enabled || level < state.level {
                return;
            }
            let entry = LogEntry {
                timestamp: Utc::now(),
                level,
                category: category.to_string(),
                message: message.into(),
                data,
            };
            state.logs.push(entry.clone());
            entry
        };
        self.sink.emit(&entry);
    }

    pub fn trace(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Trace, category, message, None);
    }

    pub fn debug(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Debug, category, message, None);
    }

    pub fn info(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, category, message, None);
    }

    pub fn warn(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Warn, category, message, None);
    }

    pub fn error(&self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Error, category, message, None);
    }

    // -- WebSocket helpers ---------------------------------------------------

    pub fn log_ws_connect(&self, url: &str) {
        self.log(
            LogLevel::Info,
            WS_CATEGORY,
            format!("connecting to {url}"),
            Some(json!({ "url": url })),
        );
    }

    pub fn log_ws_disconnect(&self, reason: Option<&str>) {
        let message = match reason {
            Some(reason) => format!("disconnected: {reason}"),
            None => "disconnected".to_string(),
        };
        self.info(WS_CATEGORY, message);
    }

    /// Logs a message at DEBUG with its serialized size in bytes.
    pub fn log_ws_message(&self, direction: Direction, data: &Value) {
        if !self.is_enabled_for(LogLevel::Debug) {
            return;
        }
        let size = serde_json::to_string(data).map(|s| s.len()).unwrap_or(0);
        self.log(
            LogLevel::Debug,
            WS_CATEGORY,
            format!("{} ({size} bytes)", direction.as_str()),
            Some(json!({
                "direction": direction,
                "size": size,
                "data": data,
                "timestamp": Utc::now().timestamp_millis(),
            })),
        );
    }

    pub fn log_ws_error(&self, error: &dyn fmt::Display) {
        self.log(
            LogLevel::Error,
            WS_CATEGORY,
            "WebSocket error",
            Some(json!({ "error": error.to_string() })),
        );
    }

    // -- Runtime controls ----------------------------------------------------

    /// Empties the buffer. Level and enabled flag are untouched.
    pub fn clear_logs(&self) {
        self.lock().logs.clear();
        tracing::debug!("debug log cleared");
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.lock().level = level;
        tracing::info!(%level, "debug log level changed");
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
        tracing::info!(enabled, "debug log toggled");
    }

    pub fn log_level(&self) -> LogLevel {
        self.lock().level
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Whether an entry at `level` would currently be recorded.
    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        let state = self.lock();
        state.enabled && level >= state.level
    }

    /// Snapshot of the buffer, oldest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.lock().logs.to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().logs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().logs.capacity()
    }

    /// Pretty-printed JSON array of the buffer with ISO-8601 timestamps.
    pub fn export_logs(&self) -> String {
        let state = self.lock();
        let records: Vec<ExportRecord<'_>> = state
            .logs
            .iter()
            .map(|entry| ExportRecord {
                time: entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                level: entry.level,
                category: &entry.category,
                message: &entry.message,
                data: entry.data.as_ref(),
            })
            .collect();
        match serde_json::to_string_pretty(&records) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to export debug log");
                "[]".to_string()
            }
        }
    }
}
