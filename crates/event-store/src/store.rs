use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{trace, warn};

use fte_debug_log::RingBuffer;
use fte_protocol::constants::channel;
use fte_protocol::messages::{ActionEvent, HealthStatus};
use fte_protocol::{Envelope, MessageType};

use crate::stats::SeverityStats;

/// Number of action events kept for the dashboard.
pub const MAX_ACTION_EVENTS: usize = 100;

/// What [`EventStore::ingest`] did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    Action,
    /// Number of module reports applied.
    Health(usize),
    Ignored,
}

/// Health channels carry either one report or a batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum HealthPayload {
    One(HealthStatus),
    Many(Vec<HealthStatus>),
}

/// Dashboard state built from published telemetry.
///
/// Keeps the most recent [`MAX_ACTION_EVENTS`] action events and the latest
/// health report per module. All methods are synchronous.
#[derive(Debug, Clone)]
pub struct EventStore {
    actions: RingBuffer<ActionEvent>,
    health: BTreeMap<String, HealthStatus>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_ACTION_EVENTS)
    }

    /// Create a store keeping `capacity` action events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            actions: RingBuffer::new(capacity),
            health: BTreeMap::new(),
        }
    }

    /// Routes a PUBLISH envelope by channel.
    ///
    /// Envelopes of other message types or on other channels are ignored, as
    /// are payloads that do not decode (with a warning).
    pub fn ingest(&mut self, envelope: &Envelope) -> Ingested {
        let header = &envelope.header;
        if header.msg_type != MessageType::Publish {
            trace!(msg_type = ?header.msg_type, channel = %header.channel, "ignoring non-publish envelope");
            return Ingested::Ignored;
        }

        match header.channel.as_str() {
            channel::ACTIONS_EVENT => match envelope.parse_payload::<ActionEvent>() {
                Ok(event) => {
                    self.add_action_event(event);
                    Ingested::Action
                }
                Err(e) => {
                    warn!(channel = %header.channel, seq = header.seq, "undecodable action event: {e}");
                    Ingested::Ignored
                }
            },
            channel::HEALTH_OVERALL | channel::HEALTH_SENSORS => {
                match envelope.parse_payload::<HealthPayload>() {
                    Ok(HealthPayload::One(status)) => {
                        self.update_health(status);
                        Ingested::Health(1)
                    }
                    Ok(HealthPayload::Many(batch)) => {
                        let count = batch.len();
                        batch.into_iter().for_each(|status| self.update_health(status));
                        Ingested::Health(count)
                    }
                    Err(e) => {
                        warn!(channel = %header.channel, seq = header.seq, "undecodable health status: {e}");
                        Ingested::Ignored
                    }
                }
            }
            other => {
                trace!(channel = other, "no handler for channel");
                Ingested::Ignored
            }
        }
    }

    /// Parses a text frame as an envelope and ingests it.
    pub fn ingest_text(&mut self, text: &str) -> Ingested {
        match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => self.ingest(&envelope),
            Err(e) => {
                warn!(len = text.len(), "inbound frame is not an envelope: {e}");
                Ingested::Ignored
            }
        }
    }

    /// Appends an event, dropping the oldest once the store is full.
    pub fn add_action_event(&mut self, event: ActionEvent) {
        self.actions.push(event);
    }

    pub fn clear_action_events(&mut self) {
        self.actions.clear();
    }

    /// Stored action events, oldest first.
    pub fn action_events(&self) -> impl DoubleEndedIterator<Item = &ActionEvent> + ExactSizeIterator {
        self.actions.iter()
    }

    /// Up to `n` most recent action events, newest first.
    pub fn recent(&self, n: usize) -> Vec<&ActionEvent> {
        self.actions.iter().rev().take(n).collect()
    }

    pub fn stats(&self) -> SeverityStats {
        SeverityStats::tally(self.actions.iter().map(|e| e.severity))
    }

    /// Replaces the stored report for the status's module.
    pub fn update_health(&mut self, status: HealthStatus) {
        self.health.insert(status.module_name.clone(), status);
    }

    pub fn health(&self, module: &str) -> Option<&HealthStatus> {
        self.health.get(module)
    }

    /// Latest report per module, ordered by module name.
    pub fn modules(&self) -> impl Iterator<Item = &HealthStatus> {
        self.health.values()
    }

    /// Reset all state.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.health.clear();
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}
