//! Public types for the connection manager.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fte_protocol::constants::{MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY, SUBPROTOCOL};

/// Where the current connection attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkPhase {
    /// No connection has been requested yet.
    #[default]
    Idle,
    /// Transport created, handshake in progress.
    Connecting,
    /// Handshake completed.
    Open,
    /// Transport closed; a retry may be pending.
    Closed,
}

/// Connectivity snapshot published to dependents.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub is_connected: bool,
    pub last_connected: Option<DateTime<Utc>>,
    /// Consecutive close events since the last successful open.
    pub reconnect_attempts: u32,
    pub error: Option<String>,
    pub phase: LinkPhase,
}

/// Connection manager settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Sub-protocol token sent in the handshake.
    pub subprotocol: String,
    /// Delay between a close event and the reconnect check.
    pub reconnect_delay: Duration,
    /// Automatic reconnects stop once this many consecutive closes are counted.
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            subprotocol: SUBPROTOCOL.to_string(),
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl InboundFrame {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            InboundFrame::Text(text) => text.len(),
            InboundFrame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InboundFrame::Text(text) => Some(text),
            InboundFrame::Binary(_) => None,
        }
    }
}
