//! Line-delimited JSON from a reader (stdin, file)

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

use contracts::{ContractError, Event, EventSource};

use crate::decode::decode_line;
use crate::metrics::IngestionMetrics;

/// Reads one event per line until EOF
///
/// An undecodable line is reported as a source error; the next call
/// continues with the following line.
pub struct LinesSource<R> {
    name: String,
    lines: Lines<R>,
    metrics: Arc<IngestionMetrics>,
}

impl<R: AsyncBufRead + Unpin> LinesSource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            lines: reader.lines(),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }
}

impl LinesSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(tokio::io::stdin()))
    }
}

impl LinesSource<BufReader<File>> {
    /// Open a JSON lines file
    pub async fn open(path: &Path) -> Result<Self, ContractError> {
        let file = File::open(path).await.map_err(|e| {
            ContractError::source(path.display().to_string(), format!("cannot open: {e}"))
        })?;
        debug!(path = %path.display(), "Opened event file");
        Ok(Self::new(
            format!("file:{}", path.display()),
            BufReader::new(file),
        ))
    }
}

impl<R> EventSource for LinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Result<Option<Event>, ContractError> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .map_err(|e| ContractError::source(&self.name, e.to_string()))?
            else {
                debug!(source = %self.name, "End of input");
                return Ok(None);
            };

            match decode_line(&self.name, &line) {
                Ok(Some(event)) => {
                    self.metrics.record_received();
                    return Ok(Some(event));
                }
                Ok(None) => continue,
                Err(e) => {
                    self.metrics.record_decode_error();
                    warn!(source = %self.name, error = %e, "Skipping undecodable line");
                    return Err(e.into());
                }
            }
        }
    }
}
