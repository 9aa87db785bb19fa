//! Event, delivery outcome and dead-letter records
//!
//! Events are produced by an `EventSource`, fanned out by the dispatcher and
//! described afterwards by one `DeliveryOutcome` per (event, sink) attempt.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EventId;

/// A unit of work to be delivered to one or more sinks.
///
/// `attempts` only ever grows, through [`Event::begin_attempt`].
#[derive(Debug, Clone)]
pub struct Event {
    id: EventId,
    payload: Bytes,
    received_at: DateTime<Utc>,
    attempts: u32,
}

impl Event {
    /// Create an event received now
    pub fn new(id: impl Into<EventId>, payload: impl Into<Bytes>) -> Self {
        Self::with_received_at(id, payload, Utc::now())
    }

    /// Create an event with an explicit receive timestamp
    pub fn with_received_at(
        id: impl Into<EventId>,
        payload: impl Into<Bytes>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            received_at,
            attempts: 0,
        }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Opaque payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Number of delivery cycles started for this event
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start a new delivery cycle, returning the new attempt number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Payload as text, replacing invalid UTF-8
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Status of one (event, sink) delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Sink accepted the event
    Delivered,
    /// Attempt failed, another one is scheduled
    Retrying,
    /// Attempt ceiling reached, no further retries
    Failed,
}

impl DeliveryStatus {
    /// `Delivered` and `Failed` are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Retrying => "retrying",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a single delivery attempt for an (event, sink) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub event_id: EventId,
    pub sink_id: String,
    pub status: DeliveryStatus,
    /// Attempt number that produced this outcome (1-based)
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl DeliveryOutcome {
    pub fn delivered(event_id: EventId, sink_id: impl Into<String>, attempts: u32) -> Self {
        Self::new(event_id, sink_id, DeliveryStatus::Delivered, attempts, None)
    }

    pub fn retrying(
        event_id: EventId,
        sink_id: impl Into<String>,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            event_id,
            sink_id,
            DeliveryStatus::Retrying,
            attempts,
            Some(error.into()),
        )
    }

    pub fn failed(
        event_id: EventId,
        sink_id: impl Into<String>,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            event_id,
            sink_id,
            DeliveryStatus::Failed,
            attempts,
            Some(error.into()),
        )
    }

    fn new(
        event_id: EventId,
        sink_id: impl Into<String>,
        status: DeliveryStatus,
        attempts: u32,
        error: Option<String>,
    ) -> Self {
        Self {
            event_id,
            sink_id: sink_id.into(),
            status,
            attempts,
            error,
            recorded_at: Utc::now(),
        }
    }
}

/// An (event, sink) pair that exhausted its delivery attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub event_id: EventId,
    pub sink_id: String,
    pub attempts: u32,
    pub error: String,
    /// Payload as text (invalid UTF-8 replaced)
    pub payload: String,
    pub received_at: DateTime<Utc>,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn from_event(event: &Event, sink_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            event_id: event.id().clone(),
            sink_id: sink_id.into(),
            attempts: event.attempts(),
            error: error.into(),
            payload: event.payload_lossy(),
            received_at: event.received_at(),
            failed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_has_no_attempts() {
        let event = Event::new("evt-1", &b"hello"[..]);
        assert_eq!(event.attempts(), 0);
        assert_eq!(event.payload().as_ref(), b"hello");
        assert_eq!(event.id(), &EventId::from("evt-1"));
    }

    #[test]
    fn test_begin_attempt_is_monotonic() {
        let mut event = Event::new("evt-1", Bytes::new());
        assert_eq!(event.begin_attempt(), 1);
        assert_eq!(event.begin_attempt(), 2);
        assert_eq!(event.attempts(), 2);
    }

    #[test]
    fn test_status_terminality() {
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_outcome_serializes_status_snake_case() {
        let outcome = DeliveryOutcome::delivered("evt-1".into(), "a", 1);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "delivered");
        assert_eq!(json["sink_id"], "a");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_dead_letter_captures_attempts_and_payload() {
        let mut event = Event::new("evt-9", &b"\xffok"[..]);
        event.begin_attempt();
        event.begin_attempt();
        let dl = DeadLetter::from_event(&event, "hook", "HTTP 500");
        assert_eq!(dl.attempts, 2);
        assert_eq!(dl.sink_id, "hook");
        assert!(dl.payload.ends_with("ok"));
    }
}
