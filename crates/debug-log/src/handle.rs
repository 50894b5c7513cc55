//! Process-wide debug handle for external tooling.
//!
//! The viewer installs its [`DebugLog`] once at startup; developer tooling
//! (a console, a signal handler, an admin endpoint) can then reach the log
//! through [`get`] without being handed the instance.

use std::sync::OnceLock;

use crate::level::LogLevel;
use crate::log::{DebugLog, LogEntry};

static GLOBAL: OnceLock<DebugLog> = OnceLock::new();

/// Registers `log` as the process-wide debug log.
///
/// Returns `false` if one was already installed; the first one stays.
pub fn install(log: DebugLog) -> bool {
    GLOBAL.set(log).is_ok()
}

/// Handle to the installed debug log, if any.
pub fn get() -> Option<DebugHandle> {
    GLOBAL.get().cloned().map(DebugHandle::new)
}

/// Retrieval and control surface over a [`DebugLog`].
#[derive(Debug, Clone)]
pub struct DebugHandle {
    log: DebugLog,
}

impl DebugHandle {
    pub fn new(log: DebugLog) -> Self {
        Self { log }
    }

    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.log.logs()
    }

    pub fn clear_logs(&self) {
        self.log.clear_logs();
    }

    pub fn export_logs(&self) -> String {
        self.log.export_logs()
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.log.set_log_level(level);
    }

    pub fn enable(&self) {
        self.log.set_enabled(true);
    }

    pub fn disable(&self) {
        self.log.set_enabled(false);
    }
}
