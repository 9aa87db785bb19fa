//! Inbound event message and outbound notification

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::RuleError;

pub const MANIFEST_CREATED: &str = "aker.events.manifest.created";
pub const MANIFEST_RECEIVED: &str = "aker.events.manifest.received";
pub const WORK_ORDER_DISPATCHED: &str = "aker.events.work_order.dispatched";
pub const WORK_ORDER_CONCLUDED: &str = "aker.events.work_order.concluded";
pub const CATALOGUE_NEW: &str = "aker.events.catalogue.new";
pub const CATALOGUE_PROCESSED: &str = "aker.events.catalogue.processed";
pub const CATALOGUE_REJECTED: &str = "aker.events.catalogue.rejected";

/// Event types that produce notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ManifestCreated,
    ManifestReceived,
    WorkOrderDispatched,
    WorkOrderConcluded,
    CatalogueNew,
    CatalogueProcessed,
    CatalogueRejected,
}

impl EventKind {
    /// `None` for event types without rules
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        Some(match event_type {
            MANIFEST_CREATED => Self::ManifestCreated,
            MANIFEST_RECEIVED => Self::ManifestReceived,
            WORK_ORDER_DISPATCHED => Self::WorkOrderDispatched,
            WORK_ORDER_CONCLUDED => Self::WorkOrderConcluded,
            CATALOGUE_NEW => Self::CatalogueNew,
            CATALOGUE_PROCESSED => Self::CatalogueProcessed,
            CATALOGUE_REJECTED => Self::CatalogueRejected,
            _ => return None,
        })
    }
}

/// Event message as published on the bus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMessage {
    pub event_type: String,

    #[serde(default)]
    pub timestamp: Value,

    #[serde(default)]
    pub user_identifier: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default)]
    pub notifier_info: Map<String, Value>,
}

impl EventMessage {
    /// Parse a JSON payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, RuleError> {
        serde_json::from_slice(payload).map_err(RuleError::Malformed)
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_event_type(&self.event_type)
    }

    /// Metadata value, if present and truthy
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key).filter(|v| is_truthy(v))
    }

    /// Metadata value rendered as text, required
    pub fn required_meta(&self, key: &str) -> Result<String, RuleError> {
        self.meta(key)
            .map(value_text)
            .ok_or_else(|| RuleError::missing(&self.event_type, format!("metadata.{key}")))
    }

    /// Notifier info value rendered as text, required
    pub fn required_info(&self, key: &str) -> Result<String, RuleError> {
        self.notifier_info
            .get(key)
            .filter(|v| is_truthy(v))
            .map(value_text)
            .ok_or_else(|| RuleError::missing(&self.event_type, format!("notifier_info.{key}")))
    }
}

/// A rendered notification, ready for a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub from_address: String,
    pub to: Vec<String>,
    /// Template the transport renders the body with
    pub template: String,
    pub data: Map<String, Value>,
}

/// Empty strings, empty collections, `false`, `0` and `null` are falsy
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Strings without quotes, everything else as JSON
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
