//! Shared plumbing for aptmethod: tracing setup and protocol timestamps.

pub mod time;
pub mod tracing;

pub use time::{TimestampError, format_timestamp, parse_timestamp};
pub use tracing::{LogFormat, TracingConfig, TracingError, init_tracing, stderr_layer};
