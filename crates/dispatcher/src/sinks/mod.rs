//! Sink implementations
//!
//! Transports (log, file, network, webhook) deliver raw envelopes on their
//! own; `ConfiguredSink` pairs one with a payload format.

mod configured;
mod file;
mod log;
mod network;
mod webhook;

pub use self::configured::{ConfiguredSink, Transport};
pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};
pub use self::webhook::{WebhookSink, WebhookSinkConfig, ATTEMPT_HEADER, EVENT_ID_HEADER};
