//! # Rules
//!
//! Turns lifecycle event messages (manifests, work orders, catalogues)
//! into notifications addressed to the people who need to act on them.
//!
//! ```ignore
//! let engine = RuleEngine::new(rules_config);
//! for notification in engine.evaluate_payload(event.payload())? {
//!     transport.send(&notification).await?;
//! }
//! ```

mod engine;
mod error;
pub mod message;

pub use engine::RuleEngine;
pub use error::RuleError;
pub use message::{EventKind, EventMessage, Notification};
