//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Delivery model
//! - An `Event` is fanned out to every configured sink
//! - Each (event, sink) attempt yields one `DeliveryOutcome`
//! - Pairs that exhaust their attempts become `DeadLetter`s

mod backoff;
mod blueprint;
mod endpoint;
mod error;
mod event;
mod event_id;
mod probe;
mod sink;
mod source;

pub use backoff::{BackoffPolicy, BackoffStrategy};
pub use blueprint::*;
pub use endpoint::{Endpoint, DEFAULT_PROBE_TIMEOUT};
pub use error::*;
pub use event::{DeadLetter, DeliveryOutcome, DeliveryStatus, Event};
pub use event_id::EventId;
pub use probe::{LocalProbe, Probe};
pub use sink::*;
pub use source::{EventSource, LocalEventSource};
