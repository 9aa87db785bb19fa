//! Rule evaluation errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    /// Payload is not a valid event message
    #[error("malformed event message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A field the rule needs is absent or empty
    #[error("{event_type}: missing required field '{field}'")]
    MissingField { event_type: String, field: String },
}

impl RuleError {
    pub fn missing(event_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            event_type: event_type.into(),
            field: field.into(),
        }
    }
}
