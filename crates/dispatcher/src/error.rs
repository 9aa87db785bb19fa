//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink could not be built from its configuration
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Dispatcher built without sinks
    #[error("no sinks configured")]
    NoSinks,

    /// Dead-letter file could not be opened
    #[error("dead-letter store error: {0}")]
    DeadLetter(String),

    /// Error from a contract (sink, source)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether the error stems from configuration
    pub fn is_config(&self) -> bool {
        match self {
            Self::SinkCreation { .. } | Self::NoSinks => true,
            Self::Contract(e) => e.is_config(),
            _ => false,
        }
    }
}
