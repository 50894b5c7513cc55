//! Wire protocol for the Forklift Twin Environment (FTE) telemetry channel.
//!
//! Every frame on the socket is a JSON [`Envelope`](envelope::Envelope):
//! a routing header plus an opaque payload.

pub mod constants;
pub mod envelope;
pub mod messages;

pub use constants::{ContentType, MessageType};
pub use envelope::{Envelope, MessageHeader};
