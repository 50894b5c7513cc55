//! Transport abstraction used by the connection manager.
//!
//! A [`Connector`] creates a [`Transport`] synchronously (the way a browser
//! `WebSocket` constructor does) and reports lifecycle events later through
//! the [`EventSink`] it was handed.

use std::fmt;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use crate::manager::Command;
use crate::types::InboundFrame;

/// Errors raised by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid sub-protocol: {0}")]
    InvalidSubprotocol(String),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("transport is not open")]
    NotOpen,

    #[error("outbound queue is full")]
    QueueFull,

    #[error("transport closed")]
    Closed,
}

/// Transport readiness, mirroring the WebSocket `readyState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// An established (or establishing) connection owned by the manager.
pub trait Transport: Send {
    fn ready_state(&self) -> ReadyState;

    /// Queues a text frame. Never blocks.
    fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Starts closing the connection. The close event arrives through the
    /// [`EventSink`] once the transport has shut down.
    fn close(&self);
}

/// Creates transports.
pub trait Connector: Send + Sync + 'static {
    /// Starts connecting to `url`.
    ///
    /// Must return without waiting for the handshake. Errors returned here
    /// are construction failures (bad URL, unusable sub-protocol); failures
    /// during the handshake are reported as error + close events instead.
    fn open(
        &self,
        url: &str,
        subprotocol: &str,
        events: EventSink,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// Lifecycle event reported by a transport.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    Opened,
    Closed { reason: Option<String> },
    Error { message: String },
    Message(InboundFrame),
}

/// Delivers transport events to the manager's event loop.
///
/// Each sink is stamped with the generation of the connect call that
/// created it; the manager drops events from superseded generations.
/// Events sent after the manager has shut down are discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::WeakUnboundedSender<Command>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self { generation, tx }
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn closed(&self, reason: Option<String>) {
        self.emit(TransportEvent::Closed { reason });
    }

    pub fn error(&self, error: &dyn fmt::Display) {
        self.emit(TransportEvent::Error {
            message: error.to_string(),
        });
    }

    pub fn message(&self, frame: InboundFrame) {
        self.emit(TransportEvent::Message(frame));
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(Command::Transport {
                generation: self.generation,
                event,
            });
        }
    }
}
