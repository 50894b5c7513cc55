use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// actions.event
// ---------------------------------------------------------------------------

/// Time stamp as published by the twin's ROS bridge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i64,
    pub nanosec: u32,
}

/// Severity of an [`ActionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// An action detected by one of the twin's modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub action_name: String,
    pub source_module: String,
    pub stamp: Stamp,
    pub seq: u64,
    pub score: f64,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_json: Option<String>,
}

// ---------------------------------------------------------------------------
// health.*
// ---------------------------------------------------------------------------

/// Lifecycle state reported by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleState {
    Active,
    Inactive,
    Error,
}

/// Health report for a single module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub module_name: String,
    pub state: ModuleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<f64>,
    pub last_heartbeat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<serde_json::Map<String, serde_json::Value>>,
}
