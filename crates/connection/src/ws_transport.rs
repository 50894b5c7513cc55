//! tokio-tungstenite implementation of [`Connector`] / [`Transport`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fte_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD};

use crate::pumps::{ping::ping_pump, read::read_pump, write::write_pump};
use crate::transport::{Connector, EventSink, ReadyState, Transport, TransportError};

/// Capacity of the outbound frame queue.
const WRITE_QUEUE_CAPACITY: usize = 256;

/// Opens real WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsConnector {
    ping_interval: Duration,
}

impl WsConnector {
    pub fn new(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(WS_PING_PERIOD)
    }
}

/// Builds the handshake request, rejecting anything that is not `ws://` or `wss://`.
pub(crate) fn build_request(url: &str, subprotocol: &str) -> Result<Request, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;

    match request.uri().scheme_str() {
        Some("ws") | Some("wss") => {}
        _ => return Err(TransportError::InvalidUrl(url.to_string())),
    }
    if request.uri().host().is_none() {
        return Err(TransportError::InvalidUrl(url.to_string()));
    }

    let protocol = HeaderValue::from_str(subprotocol)
        .map_err(|_| TransportError::InvalidSubprotocol(subprotocol.to_string()))?;
    request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);
    Ok(request)
}

impl Connector for WsConnector {
    fn open(
        &self,
        url: &str,
        subprotocol: &str,
        events: EventSink,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let request = build_request(url, subprotocol)?;

        let ready = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();

        tokio::spawn(run_connection(ConnectionTask {
            request,
            events,
            ready: ready.clone(),
            write_tx: write_tx.clone(),
            write_rx,
            ping_interval: self.ping_interval,
            cancel: cancel.clone(),
        }));

        Ok(Box::new(WsTransport {
            write_tx,
            ready,
            cancel,
        }))
    }
}

struct ConnectionTask {
    request: Request,
    events: EventSink,
    ready: Arc<AtomicU8>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    write_rx: mpsc::Receiver<tungstenite::Message>,
    ping_interval: Duration,
    cancel: CancellationToken,
}

/// Drives one connection from handshake to close, reporting every
/// lifecycle step through the task's [`EventSink`].
async fn run_connection(task: ConnectionTask) {
    let ConnectionTask {
        request,
        events,
        ready,
        write_tx,
        write_rx,
        ping_interval,
        cancel,
    } = task;

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

    let uri = request.uri().to_string();
    let handshake = tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false);

    let ws_stream = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%uri, "connect cancelled before handshake completed");
            ready.store(ReadyState::Closed as u8, Ordering::Release);
            events.closed(Some("cancelled".into()));
            return;
        }
        result = handshake => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!(%uri, error = %e, "WebSocket handshake failed");
                ready.store(ReadyState::Closed as u8, Ordering::Release);
                events.error(&e);
                events.closed(None);
                return;
            }
        }
    };

    ready.store(ReadyState::Open as u8, Ordering::Release);
    info!(%uri, "WebSocket open");
    events.opened();

    let (write, read) = ws_stream.split();
    let writer = tokio::spawn(write_pump(write, write_rx, cancel.clone()));
    let pinger = tokio::spawn(ping_pump(write_tx.clone(), ping_interval, cancel.clone()));

    let reason = read_pump(read, &events, write_tx, cancel.clone()).await;

    // Closing: stop the pumps and let the writer flush its close frame.
    let _ = ready.compare_exchange(
        ReadyState::Open as u8,
        ReadyState::Closing as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
    );
    cancel.cancel();
    pinger.abort();
    let _ = writer.await;

    ready.store(ReadyState::Closed as u8, Ordering::Release);
    info!(%uri, ?reason, "WebSocket closed");
    events.closed(reason);
}

/// Handle to a connection opened by [`WsConnector`].
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct WsTransport {
    write_tx: mpsc::Sender<tungstenite::Message>,
    ready: Arc<AtomicU8>,
    cancel: CancellationToken,
}

impl Transport for WsTransport {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::Acquire))
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }
        self.write_tx
            .try_send(tungstenite::Message::Text(text.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
            })
    }

    fn close(&self) {
        let current = self.ready.load(Ordering::Acquire);
        if current != ReadyState::Closed as u8 {
            self.ready
                .store(ReadyState::Closing as u8, Ordering::Release);
        }
        self.cancel.cancel();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::Command;
    use crate::transport::TransportEvent;

    #[test]
    fn request_carries_subprotocol() {
        let request = build_request("ws://localhost:8080/ws", "fte.v1").unwrap();
        assert_eq!(request.headers()[SEC_WEBSOCKET_PROTOCOL], "fte.v1");
        assert_eq!(request.uri().path(), "/ws");
    }

    #[test]
    fn rejects_non_websocket_schemes() {
        for url in ["http://localhost:8080/ws", "not a url", "", "ws://"] {
            assert!(
                matches!(build_request(url, "fte.v1"), Err(TransportError::InvalidUrl(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_unusable_subprotocol() {
        let result = build_request("wss://twin.example/ws", "bad\nproto");
        assert!(matches!(result, Err(TransportError::InvalidSubprotocol(_))));
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Command>) -> TransportEvent {
        loop {
            let cmd = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("event in time")
                .expect("channel open");
            if let Command::Transport { event, .. } = cmd {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn negotiates_subprotocol_and_relays_frames() {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::handshake::server;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let bridge = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let echo_protocol = |req: &server::Request, mut resp: server::Response| {
                if let Some(proto) = req.headers().get(SEC_WEBSOCKET_PROTOCOL) {
                    resp.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, proto.clone());
                }
                Ok::<_, server::ErrorResponse>(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, echo_protocol)
                .await
                .unwrap();

            ws.send(tungstenite::Message::Text("{\"hello\":1}".into()))
                .await
                .unwrap();
            let received = loop {
                match ws.next().await {
                    Some(Ok(tungstenite::Message::Text(text))) => break text.as_str().to_owned(),
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected frame: {other:?}"),
                }
            };
            ws.send(tungstenite::Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            })))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
            received
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = WsConnector::default()
            .open(
                &format!("ws://{addr}/ws"),
                "fte.v1",
                EventSink::new(1, tx.downgrade()),
            )
            .unwrap();

        assert!(matches!(next_event(&mut rx).await, TransportEvent::Opened));
        assert_eq!(transport.ready_state(), ReadyState::Open);
        transport.send_text("{\"op\":\"sub\"}".into()).unwrap();

        match next_event(&mut rx).await {
            TransportEvent::Message(frame) => assert_eq!(frame.as_text(), Some("{\"hello\":1}")),
            other => panic!("expected message, got {other:?}"),
        }
        match next_event(&mut rx).await {
            TransportEvent::Closed { reason } => assert_eq!(reason.as_deref(), Some("1000 bye")),
            other => panic!("expected close, got {other:?}"),
        }
        assert_eq!(transport.ready_state(), ReadyState::Closed);
        assert_eq!(bridge.await.unwrap(), "{\"op\":\"sub\"}");
    }

    #[tokio::test]
    async fn refused_connection_reports_error_then_close() {
        // Bind and drop a listener to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let connector = WsConnector::default();
        let transport = connector
            .open(
                &format!("ws://127.0.0.1:{port}/ws"),
                "fte.v1",
                EventSink::new(1, tx.downgrade()),
            )
            .unwrap();
        assert!(transport.send_text("early".into()).is_err());

        assert!(matches!(next_event(&mut rx).await, TransportEvent::Error { .. }));
        assert!(matches!(next_event(&mut rx).await, TransportEvent::Closed { .. }));
        assert_eq!(transport.ready_state(), ReadyState::Closed);
    }
}
