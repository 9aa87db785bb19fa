//! Layered error definitions
//!
//! Categorized by source: config / connectivity / delivery / source

use std::time::Duration;

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Connectivity Errors =====
    /// A single probe against an endpoint failed
    #[error("endpoint {endpoint} unreachable: {message}")]
    Connectivity { endpoint: String, message: String },

    /// Readiness deadline elapsed with endpoints still unreachable
    #[error("readiness deadline of {waited:?} elapsed, still waiting on: {pending:?}")]
    ReadinessDeadline {
        waited: Duration,
        pending: Vec<String>,
    },

    // ===== Delivery Errors =====
    /// Sink rejected a delivery attempt
    #[error("sink '{sink_name}' delivery error: {message}")]
    SinkDelivery { sink_name: String, message: String },

    /// Sink can never accept this event (unrenderable, oversized); not retried
    #[error("sink '{sink_name}' rejected the event: {message}")]
    SinkRejected { sink_name: String, message: String },

    /// Sink did not answer within the delivery timeout
    #[error("sink '{sink_name}' timed out after {timeout:?}")]
    SinkTimeout { sink_name: String, timeout: Duration },

    /// Attempt ceiling reached for an (event, sink) pair
    #[error("event '{event_id}' exhausted {attempts} attempts on sink '{sink_name}'")]
    Exhausted {
        event_id: String,
        sink_name: String,
        attempts: u32,
    },

    // ===== Source Errors =====
    /// Event source failed to produce an event
    #[error("source '{source_name}' error: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create connectivity error
    pub fn connectivity(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connectivity {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create sink delivery error
    pub fn sink_delivery(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkDelivery {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create a permanent, non-retryable delivery error
    pub fn sink_rejected(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkRejected {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create source error
    pub fn source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the process.
    ///
    /// Configuration and readiness failures are fatal. Delivery errors are
    /// retried and exhaustion is dead-lettered.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
                | Self::ReadinessDeadline { .. }
        )
    }

    /// Whether another delivery attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::SinkRejected { .. }
                | Self::Exhausted { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
        )
    }

    /// Whether this is a configuration error (parse or validation)
    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigParse { .. } | Self::ConfigValidation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ContractError::config_parse("bad").is_fatal());
        assert!(ContractError::config_validation("x", "bad").is_fatal());
        assert!(ContractError::ReadinessDeadline {
            waited: Duration::from_secs(1),
            pending: vec!["db:5432".into()],
        }
        .is_fatal());

        assert!(!ContractError::sink_delivery("a", "boom").is_fatal());
        assert!(!ContractError::connectivity("db:5432", "refused").is_fatal());
        assert!(!ContractError::Exhausted {
            event_id: "evt-1".into(),
            sink_name: "a".into(),
            attempts: 3,
        }
        .is_fatal());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ContractError::sink_delivery("a", "503").is_retryable());
        assert!(ContractError::SinkTimeout {
            sink_name: "a".into(),
            timeout: Duration::from_secs(1),
        }
        .is_retryable());

        let rejected = ContractError::sink_rejected("a", "missing work_order_id");
        assert!(!rejected.is_retryable());
        assert!(!rejected.is_fatal());
    }

    #[test]
    fn test_display_contains_context() {
        let err = ContractError::ReadinessDeadline {
            waited: Duration::from_secs(10),
            pending: vec!["db:5432".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("db:5432"), "got: {msg}");
    }
}
