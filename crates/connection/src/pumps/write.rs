//! Write pump: serialises outbound frames onto the socket.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Writes queued frames until the queue closes or `cancel` fires, then
/// sends a close frame.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = write.send(msg).await {
                    error!("WebSocket write error: {e}");
                    // The read side observes the broken socket and ends the connection.
                    return;
                }
            }
        }
    }

    debug!("closing WebSocket");
    let _ = write.send(tungstenite::Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use futures_util::sink;

    use super::*;

    fn capture() -> (
        impl SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
        mpsc::UnboundedReceiver<tungstenite::Message>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel::<tungstenite::Message>();
        let sink = sink::unfold(tx, |tx, msg: tungstenite::Message| async move {
            let _ = tx.send(msg);
            Ok::<_, tungstenite::Error>(tx)
        });
        (Box::pin(sink), rx)
    }

    #[tokio::test]
    async fn writes_in_order_then_closes() {
        let (sink, mut written) = capture();
        let (write_tx, write_rx) = mpsc::channel(8);

        write_tx.send(tungstenite::Message::Text("one".into())).await.unwrap();
        write_tx.send(tungstenite::Message::Text("two".into())).await.unwrap();
        drop(write_tx);

        write_pump(sink, write_rx, CancellationToken::new()).await;

        let mut texts = Vec::new();
        while let Ok(msg) = written.try_recv() {
            texts.push(msg);
        }
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0], tungstenite::Message::Text("one".into()));
        assert_eq!(texts[1], tungstenite::Message::Text("two".into()));
        assert!(matches!(texts[2], tungstenite::Message::Close(None)));
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let (sink, mut written) = capture();
        let (_write_tx, write_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            write_pump(sink, write_rx, c).await;
        });

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");

        assert!(matches!(
            written.recv().await,
            Some(tungstenite::Message::Close(_))
        ));
    }
}
