//! Read pump: forwards inbound frames to the manager.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::transport::EventSink;
use crate::types::InboundFrame;

/// Reads frames until the peer closes, the stream errors, or `cancel` fires.
///
/// Returns the close reason sent by the peer, if any. Read errors are
/// reported through `events` before returning.
pub(crate) async fn read_pump<S>(
    mut read: S,
    events: &EventSink,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) -> Option<String>
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,

            msg = read.next() => match msg {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    trace!(len = text.len(), "received text frame");
                    events.message(InboundFrame::Text(text.as_str().to_owned()));
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    trace!(len = data.len(), "received binary frame");
                    events.message(InboundFrame::Binary(data.to_vec()));
                }
                Some(Ok(tungstenite::Message::Ping(data))) => {
                    let _ = write_tx.try_send(tungstenite::Message::Pong(data));
                }
                Some(Ok(tungstenite::Message::Pong(_))) => {
                    trace!("received pong");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    debug!(?frame, "received close frame");
                    return frame.map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()));
                }
                Some(Ok(tungstenite::Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!("WebSocket read error: {e}");
                    events.error(&e);
                    return None;
                }
                None => {
                    debug!("WebSocket stream ended");
                    return None;
                }
            }
        }
    }
}
