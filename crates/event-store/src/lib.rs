pub mod stats;
pub mod store;

pub use stats::SeverityStats;
pub use store::{EventStore, Ingested, MAX_ACTION_EVENTS};
