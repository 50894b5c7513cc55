//! Connection manager owning the telemetry WebSocket.
//!
//! All lifecycle handling runs on one background task. Public operations
//! enqueue a [`Command`] and return immediately; transport events and
//! reconnect timers are fed through the same queue, so state transitions
//! never interleave.
//!
//! Every `connect` and `disconnect` bumps a generation counter. Transport
//! events and reconnect checks carry the generation they were created
//! under and are ignored once a newer one exists, which makes close
//! handling idempotent and lets `disconnect` cancel a pending retry.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, trace};

use fte_debug_log::{DebugLog, Direction, LogLevel};
use fte_protocol::{Envelope, MessageType};

use crate::reconnection::{RetryTimer, retry_allowed};
use crate::transport::{Connector, EventSink, ReadyState, Transport, TransportEvent};
use crate::types::{ConnectionConfig, ConnectionState, InboundFrame, LinkPhase};

/// Debug log category for lifecycle entries.
pub const CATEGORY: &str = "Connection";

/// Error text published when the transport reports an error.
pub const TRANSPORT_ERROR: &str = "Connection error";

/// Error text published when a transport cannot be constructed.
pub const CONSTRUCTION_ERROR: &str = "Failed to create WebSocket connection";

/// Broadcast channel capacity for inbound frames.
const INBOUND_CAPACITY: usize = 1024;

/// Work items for the event loop.
pub(crate) enum Command {
    Connect { url: String, explicit: bool },
    Disconnect,
    Send { text: String, connected: bool },
    Transport { generation: u64, event: TransportEvent },
    RetryDue { generation: u64, url: String },
    Shutdown { done: oneshot::Sender<()> },
    #[cfg(test)]
    Flush(tokio::sync::oneshot::Sender<()>),
}

/// Handle to the connection manager.
///
/// Cheap to clone; all clones drive the same connection. The background
/// task stops when [`shutdown`](Self::shutdown) is called or the last
/// handle is dropped.
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    inbound_tx: broadcast::Sender<InboundFrame>,
    log: DebugLog,
}

impl ConnectionManager {
    /// Creates the manager and spawns its event loop on the current tokio runtime.
    pub fn new(connector: Arc<dyn Connector>, config: ConnectionConfig, log: DebugLog) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::default());
        let state_tx = Arc::new(state_tx);
        let (inbound_tx, _) = broadcast::channel(INBOUND_CAPACITY);

        let driver = Driver {
            connector,
            config,
            log: log.clone(),
            state_tx: state_tx.clone(),
            inbound_tx: inbound_tx.clone(),
            commands: commands.downgrade(),
            generation: 0,
            link: None,
            retry: None,
        };
        tokio::spawn(driver.run(commands_rx));

        Self {
            commands,
            state_tx,
            inbound_tx,
            log,
        }
    }

    /// Connects to `url` unless a connection is already open.
    ///
    /// An explicit connect supersedes any in-flight attempt or pending
    /// retry and resets the attempt counter and error.
    pub fn connect(&self, url: impl Into<String>) {
        self.enqueue(Command::Connect {
            url: url.into(),
            explicit: true,
        });
    }

    /// Closes the connection and cancels any pending reconnect.
    ///
    /// `is_connected` is cleared before this returns.
    pub fn disconnect(&self) {
        self.state_tx.send_if_modified(|state| {
            let was_connected = state.is_connected;
            state.is_connected = false;
            was_connected
        });
        self.enqueue(Command::Disconnect);
    }

    /// Serializes `data` as JSON and sends it if connected; otherwise the
    /// message is dropped and an error is logged.
    ///
    /// Connectivity is sampled here, so a message sent before a
    /// `disconnect` still goes out.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) {
        let connected = self.is_connected();
        match serde_json::to_string(data) {
            Ok(text) => self.enqueue(Command::Send { text, connected }),
            Err(e) => self.log.log(
                LogLevel::Error,
                CATEGORY,
                "failed to serialize outbound message",
                Some(json!({ "error": e.to_string() })),
            ),
        }
    }

    /// Sends a SUB control envelope for `channel`.
    pub fn subscribe(&self, channel: &str) {
        self.send_control(MessageType::Sub, channel);
    }

    /// Sends an UNSUB control envelope for `channel`.
    pub fn unsubscribe(&self, channel: &str) {
        self.send_control(MessageType::Unsub, channel);
    }

    fn send_control(&self, msg_type: MessageType, channel: &str) {
        match Envelope::control(msg_type, channel) {
            Ok(envelope) => self.send(&envelope),
            Err(e) => self.log.log(
                LogLevel::Error,
                CATEGORY,
                format!("failed to build {msg_type:?} envelope"),
                Some(json!({ "channel": channel, "error": e.to_string() })),
            ),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_tx.borrow().is_connected
    }

    /// Receiver notified on every state change.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Receiver for inbound frames. Each call returns an independent receiver.
    pub fn messages(&self) -> broadcast::Receiver<InboundFrame> {
        self.inbound_tx.subscribe()
    }

    /// Stops the event loop and closes the connection.
    ///
    /// Resolves once the loop has stopped and the transport has been told to
    /// close. Returns immediately if the loop is already gone.
    pub async fn shutdown(&self) {
        let (done, stopped) = oneshot::channel();
        self.enqueue(Command::Shutdown { done });
        let _ = stopped.await;
    }

    fn enqueue(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("connection manager has shut down, command dropped");
        }
    }

    /// Resolves once every previously queued command has been handled.
    #[cfg(test)]
    pub(crate) async fn settle(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.enqueue(Command::Flush(tx));
        let _ = rx.await;
    }
}

/// The transport currently owned by the manager.
struct Link {
    generation: u64,
    url: String,
    transport: Box<dyn Transport>,
}

/// State owned by the event loop.
struct Driver {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    log: DebugLog,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    inbound_tx: broadcast::Sender<InboundFrame>,
    commands: mpsc::WeakUnboundedSender<Command>,
    generation: u64,
    link: Option<Link>,
    retry: Option<RetryTimer>,
}

impl Driver {
    async fn run(mut self, mut commands_rx: mpsc::UnboundedReceiver<Command>) {
        let mut stopped = None;
        while let Some(command) = commands_rx.recv().await {
            match command {
                Command::Connect { url, explicit } => self.connect(url, explicit),
                Command::Disconnect => self.disconnect(),
                Command::Send { text, connected } => self.send(text, connected),
                Command::Transport { generation, event } => self.on_transport(generation, event),
                Command::RetryDue { generation, url } => self.on_retry_due(generation, url),
                Command::Shutdown { done } => {
                    stopped = Some(done);
                    break;
                }
                #[cfg(test)]
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }

        self.retry = None;
        if let Some(link) = self.link.take() {
            link.transport.close();
        }
        debug!("connection manager stopped");
        if let Some(done) = stopped {
            let _ = done.send(());
        }
    }

    fn cancel_retry(&mut self) {
        if let Some(retry) = self.retry.take() {
            debug!(generation = retry.generation(), "pending reconnect cancelled");
        }
    }

    fn update(&self, apply: impl FnOnce(&mut ConnectionState)) {
        self.state_tx.send_modify(apply);
    }

    fn connect(&mut self, url: String, explicit: bool) {
        if let Some(link) = &self.link
            && link.transport.ready_state() == ReadyState::Open
        {
            self.log.log(
                LogLevel::Info,
                CATEGORY,
                "already connected",
                Some(json!({ "url": link.url })),
            );
            return;
        }

        self.cancel_retry();
        if let Some(previous) = self.link.take() {
            debug!(generation = previous.generation, "superseding in-flight connection");
            previous.transport.close();
        }
        self.generation += 1;
        let generation = self.generation;

        self.update(|state| {
            state.is_connected = false;
            state.phase = LinkPhase::Connecting;
            if explicit {
                state.reconnect_attempts = 0;
                state.error = None;
            }
        });
        self.log.log_ws_connect(&url);

        let events = EventSink::new(generation, self.commands.clone());
        match self.connector.open(&url, &self.config.subprotocol, events) {
            Ok(transport) => {
                self.link = Some(Link {
                    generation,
                    url,
                    transport,
                });
            }
            Err(e) => {
                self.update(|state| {
                    state.error = Some(CONSTRUCTION_ERROR.to_string());
                    state.phase = LinkPhase::Closed;
                });
                self.log.log(
                    LogLevel::Error,
                    CATEGORY,
                    "failed to connect",
                    Some(json!({ "url": url, "error": e.to_string() })),
                );
            }
        }
    }

    fn disconnect(&mut self) {
        self.cancel_retry();
        self.generation += 1;

        if let Some(link) = self.link.take() {
            link.transport.close();
            self.update(|state| {
                state.is_connected = false;
                state.phase = LinkPhase::Closed;
            });
            self.log.log_ws_disconnect(Some("closed by client"));
        }
    }

    /// `connected` is the state observed when the caller issued the send.
    fn send(&mut self, text: String, connected: bool) {
        let Some(link) = self.link.as_ref().filter(|_| connected) else {
            self.log.log(
                LogLevel::Error,
                CATEGORY,
                "WebSocket is not connected, message dropped",
                Some(json!({ "size": text.len() })),
            );
            return;
        };

        let logged = self
            .log
            .is_enabled_for(LogLevel::Debug)
            .then(|| serde_json::from_str::<Value>(&text).ok())
            .flatten();
        match link.transport.send_text(text) {
            Ok(()) => {
                if let Some(value) = logged {
                    self.log.log_ws_message(Direction::Sent, &value);
                }
            }
            Err(e) => self.log.log(
                LogLevel::Error,
                CATEGORY,
                "failed to send message",
                Some(json!({ "error": e.to_string() })),
            ),
        }
    }

    fn on_transport(&mut self, generation: u64, event: TransportEvent) {
        let current = self
            .link
            .as_ref()
            .is_some_and(|link| link.generation == generation);
        if !current {
            trace!(generation, current = self.generation, ?event, "ignoring stale transport event");
            return;
        }

        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Closed { reason } => self.on_close(reason),
            TransportEvent::Error { message } => self.on_error(message),
            TransportEvent::Message(frame) => self.on_message(frame),
        }
    }

    fn on_open(&mut self) {
        self.update(|state| {
            state.is_connected = true;
            state.last_connected = Some(Utc::now());
            state.reconnect_attempts = 0;
            state.error = None;
            state.phase = LinkPhase::Open;
        });
        let url = self.link.as_ref().map(|link| link.url.clone());
        self.log.log(
            LogLevel::Info,
            CATEGORY,
            "WebSocket connected",
            Some(json!({ "url": url })),
        );
    }

    fn on_close(&mut self, reason: Option<String>) {
        let Some(link) = self.link.take() else {
            return;
        };
        let mut attempts = 0;
        self.update(|state| {
            state.is_connected = false;
            state.reconnect_attempts = state.reconnect_attempts.saturating_add(1);
            state.phase = LinkPhase::Closed;
            attempts = state.reconnect_attempts;
        });
        self.log.log_ws_disconnect(reason.as_deref());
        debug!(attempts, delay = ?self.config.reconnect_delay, "scheduling reconnect check");

        self.retry = Some(RetryTimer::schedule(
            self.config.reconnect_delay,
            self.generation,
            link.url,
            self.commands.clone(),
        ));
    }

    fn on_error(&mut self, message: String) {
        self.update(|state| state.error = Some(TRANSPORT_ERROR.to_string()));
        self.log.log_ws_error(&message);
    }

    fn on_message(&mut self, frame: InboundFrame) {
        match frame.as_text().map(serde_json::from_str::<Value>) {
            Some(Ok(value)) => self.log.log_ws_message(Direction::Received, &value),
            _ => self.log.log(
                LogLevel::Debug,
                CATEGORY,
                "received non-JSON frame",
                Some(json!({ "size": frame.len() })),
            ),
        }
        let _ = self.inbound_tx.send(frame);
    }

    fn on_retry_due(&mut self, generation: u64, url: String) {
        if generation != self.generation {
            trace!(generation, current = self.generation, "ignoring stale reconnect check");
            return;
        }
        self.retry = None;

        let attempts = self.state_tx.borrow().reconnect_attempts;
        if retry_allowed(attempts, self.config.max_reconnect_attempts) {
            debug!(attempts, %url, "reconnecting");
            self.connect(url, false);
        } else {
            self.log.log(
                LogLevel::Error,
                CATEGORY,
                "reconnect attempts exhausted, giving up",
                Some(json!({
                    "url": url,
                    "attempts": attempts,
                    "max_attempts": self.config.max_reconnect_attempts,
                })),
            );
        }
    }
}
