use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::constants::{ContentType, MessageType};

/// Routing header of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub msg_type: MessageType,
    pub channel: String,
    pub seq: u64,
    /// Wall-clock time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monotonic: Option<u64>,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Header + payload unit exchanged over the socket.
///
/// The payload is kept as raw JSON; interpreting it is up to whoever
/// consumes the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: MessageHeader,
    pub payload: Box<RawValue>,
}

impl Envelope {
    /// Creates a JSON envelope for `channel` stamped with the current time.
    pub fn new<T: Serialize>(
        msg_type: MessageType,
        channel: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let now = now_millis();
        Ok(Self {
            header: MessageHeader {
                msg_type,
                channel: channel.into(),
                seq: now,
                timestamp: now,
                monotonic: None,
                content_type: ContentType::Json,
                idempotency_key: None,
            },
            payload: serde_json::value::to_raw_value(payload)?,
        })
    }

    /// Creates a control message (SUB / UNSUB) with an empty object payload.
    ///
    /// `seq` and `timestamp` both carry the current time in milliseconds, so
    /// two calls within the same millisecond share a `seq`.
    pub fn control(
        msg_type: MessageType,
        channel: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        Self::new(msg_type, channel, &serde_json::Map::new())
    }

    /// Creates a COMMAND envelope carrying a fresh idempotency key.
    pub fn command<T: Serialize>(
        channel: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let mut envelope = Self::new(MessageType::Command, channel, payload)?;
        envelope.header.idempotency_key = Some(uuid::Uuid::new_v4().to_string());
        Ok(envelope)
    }

    /// Raw JSON text of the payload.
    pub fn payload_json(&self) -> &str {
        self.payload.get()
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.payload.get())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
