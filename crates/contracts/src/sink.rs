//! EventSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for sinks.

use crate::{ContractError, Event};

/// Notification output trait
///
/// All sink implementations must implement this trait. Methods take `&self`
/// because several workers may deliver to the same sink concurrently; sinks
/// with mutable state guard it internally.
#[trait_variant::make(EventSink: Send)]
pub trait LocalEventSink {
    /// Sink name (used for outcomes, logging and metrics)
    fn name(&self) -> &str;

    /// Deliver one event
    ///
    /// # Errors
    /// Returns a delivery error (should include context). The dispatcher
    /// retries failed deliveries up to its attempt ceiling.
    async fn deliver(&self, event: &Event) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&self) -> Result<(), ContractError>;
}
