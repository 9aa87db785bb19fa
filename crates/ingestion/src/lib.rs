//! # Ingestion
//!
//! Event sources feeding the dispatcher.
//!
//! Responsibilities:
//! - Decode line-delimited JSON into `Event`s (id from the `id` field)
//! - Read from stdin, a file, or TCP clients
//! - In-process channel for embedding and tests
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::channel;
//!
//! let (publisher, source) = channel("inbox", 1024);
//! publisher.publish_payload("evt-1", r#"{"event_type":"x"}"#).await?;
//! dispatcher.run(source, cancel).await;
//! ```

mod channel;
mod configured;
mod decode;
mod error;
mod lines;
mod metrics;
mod tcp;

pub use channel::{channel, ChannelSource, EventPublisher};
pub use configured::ConfiguredSource;
pub use contracts::{Event, EventSource};
pub use decode::decode_line;
pub use error::{IngestionError, Result};
pub use lines::LinesSource;
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use tcp::TcpSource;
