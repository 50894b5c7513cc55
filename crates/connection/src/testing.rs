//! In-memory [`Connector`] whose transports are driven by the test.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::transport::{Connector, EventSink, ReadyState, Transport, TransportError};
use crate::types::InboundFrame;

#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    links: Arc<Mutex<Vec<ScriptedLink>>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of transports successfully created.
    pub(crate) fn opened(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub(crate) fn link(&self, index: usize) -> ScriptedLink {
        self.links.lock().unwrap()[index].clone()
    }
}

impl Connector for ScriptedConnector {
    fn open(
        &self,
        url: &str,
        subprotocol: &str,
        events: EventSink,
    ) -> Result<Box<dyn Transport>, TransportError> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }
        let link = ScriptedLink {
            url: url.to_string(),
            subprotocol: subprotocol.to_string(),
            events,
            ready: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };
        self.links.lock().unwrap().push(link.clone());
        Ok(Box::new(ScriptedTransport { link }))
    }
}

/// Test-side view of one transport.
#[derive(Clone)]
pub(crate) struct ScriptedLink {
    pub(crate) url: String,
    pub(crate) subprotocol: String,
    events: EventSink,
    ready: Arc<AtomicU8>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedLink {
    pub(crate) fn open(&self) {
        self.ready.store(ReadyState::Open as u8, Ordering::Release);
        self.events.opened();
    }

    /// Peer-initiated close.
    pub(crate) fn close(&self) {
        self.ready.store(ReadyState::Closed as u8, Ordering::Release);
        self.events.closed(Some("1006 abnormal closure".into()));
    }

    pub(crate) fn error(&self, message: &str) {
        self.events.error(&message);
    }

    /// Failed handshake: error followed by close.
    pub(crate) fn fail(&self) {
        self.ready.store(ReadyState::Closed as u8, Ordering::Release);
        self.events.error(&"connection refused");
        self.events.closed(None);
    }

    pub(crate) fn receive(&self, frame: InboundFrame) {
        self.events.message(frame);
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Whether the manager asked this transport to close.
    pub(crate) fn was_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct ScriptedTransport {
    link: ScriptedLink,
}

impl Transport for ScriptedTransport {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.link.ready.load(Ordering::Acquire))
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }
        self.link.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self) {
        self.link.closed.store(true, Ordering::Release);
        self.link
            .ready
            .store(ReadyState::Closing as u8, Ordering::Release);
    }
}
