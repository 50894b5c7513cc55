mod config;
mod dashboard;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fte_connection::{ConnectionManager, WsConnector};
use fte_debug_log::{DebugLog, DebugLogConfig, handle};
use fte_event_store::EventStore;
use fte_protocol::constants::channel;

use config::ViewerConfig;

/// Time left for the close handshake before the runtime goes away.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = ViewerConfig::from_env();
    let debug_mode = loaded.as_ref().is_ok_and(|cfg| cfg.debug_mode);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if debug_mode { "debug" } else { "info" })
        }))
        .init();

    let cfg = loaded.unwrap_or_else(|e| {
        warn!("invalid configuration, using defaults: {e}");
        ViewerConfig::default()
    });
    info!(ws_url = %cfg.ws_url, api_url = %cfg.api_url, debug_mode = cfg.debug_mode, "starting FTE viewer");

    let log = DebugLog::new(DebugLogConfig::from_debug_mode(cfg.debug_mode));
    if !handle::install(log.clone()) {
        warn!("debug log already installed");
    }

    let connector = Arc::new(WsConnector::new(cfg.ping_interval));
    let manager = ConnectionManager::new(connector, cfg.connection(), log);
    let store = Arc::new(Mutex::new(EventStore::new()));

    let subscriber = tokio::spawn(dashboard::subscription_loop(manager.clone()));
    let ingest = tokio::spawn(dashboard::ingest_loop(manager.messages(), store.clone()));

    manager.connect(cfg.ws_url.as_str());

    let mut ticker = tokio::time::interval(cfg.update_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => dashboard::report(&manager, &store).await,
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("shutting down");
                break;
            }
        }
    }

    subscriber.abort();
    if manager.is_connected() {
        for name in channel::DASHBOARD {
            manager.unsubscribe(name);
        }
    }
    manager.disconnect();
    manager.shutdown().await;
    // The write pump flushes its close frame on its own task.
    tokio::time::sleep(CLOSE_GRACE).await;
    ingest.abort();

    if cfg.debug_mode
        && let Some(debug) = handle::get()
    {
        println!("{}", debug.export_logs());
    }

    Ok(())
}
