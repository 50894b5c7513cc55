//! Viewer configuration, read from `FTE_*` environment variables.

use std::time::Duration;

use fte_connection::ConnectionConfig;
use fte_protocol::constants::{
    DEFAULT_WS_URL, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY, SUBPROTOCOL, WS_PING_PERIOD,
};

const DEFAULT_API_URL: &str = "http://localhost:8080/api";
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// A variable was set to a value that could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a number of milliseconds, got {value:?}")]
    InvalidDuration { var: &'static str, value: String },

    #[error("{var} must be true or false, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub ws_url: String,
    /// REST endpoint of the bridge. Not used by the viewer itself.
    pub api_url: String,
    pub subprotocol: String,
    pub reconnect_interval: Duration,
    pub ping_interval: Duration,
    /// How often dashboard stats are reported.
    pub update_interval: Duration,
    pub debug_mode: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.into(),
            api_url: DEFAULT_API_URL.into(),
            subprotocol: SUBPROTOCOL.into(),
            reconnect_interval: RECONNECT_DELAY,
            ping_interval: WS_PING_PERIOD,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            debug_mode: false,
        }
    }
}

impl ViewerConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from `lookup`; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("FTE_WS_URL") {
            cfg.ws_url = non_empty("FTE_WS_URL", v)?;
        }
        if let Some(v) = lookup("FTE_API_URL") {
            cfg.api_url = non_empty("FTE_API_URL", v)?;
        }
        if let Some(v) = lookup("FTE_WS_SUBPROTOCOL") {
            cfg.subprotocol = non_empty("FTE_WS_SUBPROTOCOL", v)?;
        }
        if let Some(v) = lookup("FTE_RECONNECT_INTERVAL") {
            cfg.reconnect_interval = millis("FTE_RECONNECT_INTERVAL", v)?;
        }
        if let Some(v) = lookup("FTE_PING_INTERVAL") {
            cfg.ping_interval = millis("FTE_PING_INTERVAL", v)?;
        }
        if let Some(v) = lookup("FTE_UPDATE_INTERVAL") {
            cfg.update_interval = millis("FTE_UPDATE_INTERVAL", v)?;
        }
        if let Some(v) = lookup("FTE_DEBUG_MODE") {
            cfg.debug_mode = boolean("FTE_DEBUG_MODE", v)?;
        }

        Ok(cfg)
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            subprotocol: self.subprotocol.clone(),
            reconnect_delay: self.reconnect_interval,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

fn non_empty(var: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { var });
    }
    Ok(trimmed.to_string())
}

fn millis(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidDuration { var, value }),
    }
}

fn boolean(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value }),
    }
}
