//! Source selected by configuration

use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{BufReader, Stdin};
use tracing::instrument;

use contracts::{ContractError, Event, EventSource, SourceConfig, SourceKind};

use crate::lines::LinesSource;
use crate::metrics::IngestionMetrics;
use crate::tcp::TcpSource;

/// One of the built-in sources
pub enum ConfiguredSource {
    Stdin(LinesSource<BufReader<Stdin>>),
    File(LinesSource<BufReader<File>>),
    Tcp(TcpSource),
}

impl ConfiguredSource {
    /// Open the source described by `config`
    #[instrument(name = "ingestion_open_source", skip(config), fields(kind = ?config.kind))]
    pub async fn open(config: &SourceConfig) -> Result<Self, ContractError> {
        match config.kind {
            SourceKind::Stdin => Ok(Self::Stdin(LinesSource::stdin())),
            SourceKind::File => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or_else(|| ContractError::config_validation("source.path", "missing"))?;
                Ok(Self::File(LinesSource::open(path).await?))
            }
            SourceKind::Tcp => {
                let addr = config
                    .addr
                    .as_deref()
                    .ok_or_else(|| ContractError::config_validation("source.addr", "missing"))?;
                Ok(Self::Tcp(
                    TcpSource::bind(addr, config.channel_capacity).await?,
                ))
            }
        }
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        match self {
            Self::Stdin(s) => s.metrics(),
            Self::File(s) => s.metrics(),
            Self::Tcp(s) => s.metrics(),
        }
    }
}

impl EventSource for ConfiguredSource {
    fn name(&self) -> &str {
        match self {
            Self::Stdin(s) => s.name(),
            Self::File(s) => s.name(),
            Self::Tcp(s) => s.name(),
        }
    }

    async fn next_event(&mut self) -> Result<Option<Event>, ContractError> {
        match self {
            Self::Stdin(s) => s.next_event().await,
            Self::File(s) => s.next_event().await,
            Self::Tcp(s) => s.next_event().await,
        }
    }
}
