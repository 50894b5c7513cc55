//! Background tasks feeding the dashboard.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, trace, warn};

use fte_connection::{ConnectionManager, InboundFrame, LinkPhase};
use fte_event_store::{EventStore, Ingested};
use fte_protocol::constants::channel;
use fte_protocol::messages::ModuleState;

/// Whether a phase change is a fresh transition into OPEN.
pub fn became_open(previous: LinkPhase, current: LinkPhase) -> bool {
    previous != LinkPhase::Open && current == LinkPhase::Open
}

/// Subscribes the dashboard channels every time the link opens.
///
/// The bridge forgets subscriptions when a connection drops.
pub async fn subscription_loop(manager: ConnectionManager) {
    let mut states = manager.state_receiver();
    let mut previous = states.borrow_and_update().phase;

    while states.changed().await.is_ok() {
        let current = states.borrow_and_update().phase;
        if became_open(previous, current) {
            info!(channels = ?channel::DASHBOARD, "subscribing dashboard channels");
            for name in channel::DASHBOARD {
                manager.subscribe(name);
            }
        }
        previous = current;
    }
    debug!("state channel closed, subscription loop done");
}

/// Feeds inbound frames into the event store until the manager stops.
pub async fn ingest_loop(
    mut frames: broadcast::Receiver<InboundFrame>,
    store: Arc<Mutex<EventStore>>,
) {
    loop {
        match frames.recv().await {
            Ok(InboundFrame::Text(text)) => {
                let outcome = store.lock().await.ingest_text(&text);
                if outcome != Ingested::Ignored {
                    trace!(?outcome, "frame ingested");
                }
            }
            Ok(InboundFrame::Binary(data)) => {
                trace!(len = data.len(), "skipping binary frame");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event store fell behind, frames dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("inbound channel closed, ingest loop done");
}

/// Logs a one-line dashboard summary.
pub async fn report(manager: &ConnectionManager, store: &Mutex<EventStore>) {
    let state = manager.state();
    let store = store.lock().await;
    let stats = store.stats();
    let unhealthy = store
        .modules()
        .filter(|h| h.state != ModuleState::Active)
        .count();

    info!(
        connected = state.is_connected,
        phase = ?state.phase,
        reconnect_attempts = state.reconnect_attempts,
        error = state.error.as_deref().unwrap_or(""),
        total = stats.total_events,
        info = stats.info_count,
        warn = stats.warn_count,
        error_events = stats.error_count,
        modules = store.modules().count(),
        unhealthy,
        "dashboard"
    );
}
