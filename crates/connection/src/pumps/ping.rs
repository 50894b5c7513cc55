//! Ping pump: periodic keepalive pings.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

/// Queues a ping every `period` until cancelled or the writer goes away.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(Vec::new().into());
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pings_every_period() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(ping_pump(tx, Duration::from_secs(30), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(matches!(rx.try_recv(), Ok(tungstenite::Message::Ping(_))));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_writer_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        tokio::time::timeout(
            Duration::from_secs(5),
            ping_pump(tx, Duration::from_millis(10), CancellationToken::new()),
        )
        .await
        .expect("should stop");
    }
}
