//! Error types for CLI operations.

use contracts::ContractError;
use dispatcher::DispatcherError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[source] ContractError),

    /// Dependencies still unreachable at the deadline
    #[error("Dependencies not ready: {0}")]
    Readiness(#[source] ContractError),

    /// Event source could not be opened
    #[error("Failed to open event source: {0}")]
    Source(#[source] ContractError),

    /// Dispatcher setup or run failure
    #[error("Dispatcher failed: {0}")]
    Dispatch(#[from] DispatcherError),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Classify a contract error by what went wrong
    pub fn from_contract(error: ContractError) -> Self {
        match error {
            e if e.is_config() => Self::Config(e),
            e @ ContractError::ReadinessDeadline { .. } => Self::Readiness(e),
            e => Self::Other(anyhow::Error::new(e)),
        }
    }

    /// Process exit code
    ///
    /// 2 configuration, 3 readiness deadline, 1 anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Source(e) if e.is_config() => 2,
            Self::Dispatch(e) if e.is_config() => 2,
            Self::Readiness(_) => 3,
            _ => 1,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        let config = CliError::from_contract(ContractError::config_parse("bad toml"));
        assert_eq!(config.exit_code(), 2);

        let readiness = CliError::from_contract(ContractError::ReadinessDeadline {
            waited: Duration::from_secs(5),
            pending: vec!["db:5432".into()],
        });
        assert_eq!(readiness.exit_code(), 3);

        assert_eq!(CliError::Dispatch(DispatcherError::NoSinks).exit_code(), 2);
        assert_eq!(
            CliError::from_contract(ContractError::Other("boom".into())).exit_code(),
            1
        );
    }
}
