//! Structured debug log for the FTE viewer.
//!
//! Entries are leveled and categorized, kept in a fixed-capacity ring
//! buffer, mirrored to a pluggable [`LogSink`] and exportable as
//! human-readable JSON.

pub mod buffer;
pub mod handle;
pub mod level;
pub mod log;
pub mod sink;

pub use buffer::RingBuffer;
pub use handle::DebugHandle;
pub use level::{LogLevel, ParseLevelError};
pub use log::{DebugLog, DebugLogConfig, Direction, LogEntry};
pub use sink::{LogSink, MemorySink, NullSink, TracingSink};
