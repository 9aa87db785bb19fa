//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 从 `EventSource` 拉取事件，Fan-out 到所有 sinks
//! - 每个 (event, sink) 独立重试，超过上限进入死信
//! - 取消后在宽限期内排空在途投递

pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod payload;
mod scheduler;
pub mod sinks;
mod worker;

pub use contracts::{EventSink, EventSource};
pub use dead_letter::DeadLetterStore;
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use ledger::OutcomeLedger;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use payload::{Document, EventEnvelope, PayloadRenderer};
pub use scheduler::AbandonedDelivery;
pub use sinks::{ConfiguredSink, FileSink, LogSink, NetworkSink, Transport, WebhookSink};
pub use tokio_util::sync::CancellationToken;
