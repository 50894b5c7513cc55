//! Background tasks driving an open WebSocket.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
