//! EventSource trait - Dispatcher input interface
//!
//! Decouples the dispatcher from where events come from (channel, stdin,
//! file, TCP listener, mock).

use crate::{ContractError, Event};

/// Event source trait
///
/// Owned by exactly one consumer (the dispatcher scheduler), hence `&mut self`.
#[trait_variant::make(EventSource: Send)]
pub trait LocalEventSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Pull the next available event
    ///
    /// Returns `Ok(None)` once the source is closed and will never yield
    /// again. Errors are transient: the caller may keep pulling.
    async fn next_event(&mut self) -> Result<Option<Event>, ContractError>;
}
