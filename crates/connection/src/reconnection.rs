//! Deferred reconnect checks.
//!
//! After a close event the manager arms a [`RetryTimer`]. When it fires, a
//! [`Command::RetryDue`] stamped with the generation that scheduled it is
//! queued; the manager drops it if a newer `connect`/`disconnect` has
//! happened since, and otherwise samples the attempt counter at that moment.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::manager::Command;

/// A pending reconnect check. Dropping it cancels the check.
#[derive(Debug)]
pub(crate) struct RetryTimer {
    generation: u64,
    cancel: CancellationToken,
}

impl RetryTimer {
    /// Queues `RetryDue { generation, url }` after `delay`.
    pub(crate) fn schedule(
        delay: Duration,
        generation: u64,
        url: String,
        tx: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(generation, "reconnect check cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(Command::RetryDue { generation, url });
                    }
                }
            }
        });
        Self { generation, cancel }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Whether another automatic attempt is allowed after `attempts` consecutive closes.
pub(crate) fn retry_allowed(attempts: u32, max_attempts: u32) -> bool {
    attempts < max_attempts
}
