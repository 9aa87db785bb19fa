//! What a sink actually transmits for an event

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use contracts::{ContractError, Event, PayloadFormat};
use rules::{Notification, RuleEngine};

/// Event as delivered in `raw` format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub received_at: DateTime<Utc>,
    /// Delivery cycle this document was produced in
    pub attempts: u32,
    /// Original payload as text
    pub payload: String,
}

impl EventEnvelope {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id().to_string(),
            received_at: event.received_at(),
            attempts: event.attempts(),
            payload: event.payload_lossy(),
        }
    }
}

/// One transmitted document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Envelope(EventEnvelope),
    Notification(Notification),
}

impl Document {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Envelope(_) => "envelope",
            Self::Notification(_) => "notification",
        }
    }
}

/// Turns an event into the documents a sink transmits
#[derive(Debug, Clone)]
pub enum PayloadRenderer {
    Raw,
    Notification(Arc<RuleEngine>),
}

impl PayloadRenderer {
    pub fn new(format: PayloadFormat, engine: Option<Arc<RuleEngine>>) -> Result<Self, String> {
        match (format, engine) {
            (PayloadFormat::Raw, _) => Ok(Self::Raw),
            (PayloadFormat::Notification, Some(engine)) => Ok(Self::Notification(engine)),
            (PayloadFormat::Notification, None) => {
                Err("notification format requires a [rules] section".to_string())
            }
        }
    }

    /// Documents for one event
    ///
    /// An event without matching rules renders to nothing. A payload the
    /// rules cannot evaluate is rejected for good: rendering is deterministic.
    pub fn render(&self, sink_name: &str, event: &Event) -> Result<Vec<Document>, ContractError> {
        match self {
            Self::Raw => Ok(vec![Document::Envelope(EventEnvelope::from_event(event))]),
            Self::Notification(engine) => engine
                .evaluate_payload(event.payload())
                .map(|ns| ns.into_iter().map(Document::Notification).collect())
                .map_err(|e| ContractError::sink_rejected(sink_name, e.to_string())),
        }
    }
}
