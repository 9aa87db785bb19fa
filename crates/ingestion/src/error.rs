//! Ingestion error types

use thiserror::Error;

use contracts::ContractError;

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestionError {
    /// A line could not be decoded into an event
    #[error("failed to decode event from {source_name}: {message}")]
    Decode {
        source_name: String,
        message: String,
    },

    /// Every consumer is gone
    #[error("channel closed for source {source_name}")]
    ChannelClosed { source_name: String },

    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn decode(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Decode {
                source_name,
                message,
            } => ContractError::source(source_name, message),
            IngestionError::ChannelClosed { source_name } => {
                ContractError::source(source_name, "channel closed")
            }
            IngestionError::Bind { addr, source } => {
                ContractError::source(addr, format!("bind failed: {source}"))
            }
            IngestionError::Io(e) => ContractError::Io(e),
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
