//! Connection manager for the FTE telemetry WebSocket.
//!
//! Owns a single transport, reconnects automatically a bounded number of
//! times after the link drops, and speaks the SUB / UNSUB / PUBLISH
//! envelope protocol from [`fte_protocol`].

pub mod manager;
pub mod pumps;
pub(crate) mod reconnection;
pub mod transport;
pub mod types;
pub mod ws_transport;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::ConnectionManager;
pub use transport::{Connector, EventSink, ReadyState, Transport, TransportError};
pub use types::{ConnectionConfig, ConnectionState, InboundFrame, LinkPhase};
pub use ws_transport::{WsConnector, WsTransport};
