use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sub-protocol token negotiated during the WebSocket handshake.
pub const SUBPROTOCOL: &str = "fte.v1";

/// Endpoint used when no URL is configured.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Delay between a close event and the reconnect check.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Automatic reconnects stop once this many consecutive closes are counted.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// How often the client pings an open connection.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(30);

/// Maximum inbound message size in bytes (16 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Well-known channel names published by the FTE bridge.
pub mod channel {
    pub const ACTIONS_EVENT: &str = "actions.event";
    pub const HEALTH_OVERALL: &str = "health.overall";
    pub const HEALTH_SENSORS: &str = "health.sensors";
    pub const LOGS_METRIC: &str = "logs.metric";
    pub const CONTROL_INDICATOR: &str = "control.indicator";

    /// Channels the dashboard subscribes to on every (re)connect.
    pub const DASHBOARD: [&str; 3] = [ACTIONS_EVENT, HEALTH_OVERALL, LOGS_METRIC];
}

/// Envelope message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Publish,
    Sub,
    Unsub,
    Command,
    Ack,
    Error,
}

/// Encoding of the envelope payload.
///
/// Only `Json` is produced by this client; the other variants are accepted
/// in inbound headers and passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Proto,
    Msgpack,
    Json,
}
