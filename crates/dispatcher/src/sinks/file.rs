//! FileSink - appends documents to a JSON lines file

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contracts::{ContractError, Event, EventSink};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use crate::payload::{Document, EventEnvelope};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created if missing
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Sink that appends one JSON document per line
///
/// Every document is flushed before `send` returns, so a delivered
/// document is on disk.
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    /// Open (or create) the output file
    pub async fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await?;

        Ok(Self {
            name: name.into(),
            path: config.path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Create from sink params
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.path"), e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_delivery(name, e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one document for `event`
    pub async fn send(&self, event: &Event, document: &Document) -> Result<(), ContractError> {
        let mut line = serde_json::to_vec(document)
            .map_err(|e| ContractError::sink_delivery(&self.name, format!("json error: {e}")))?;
        line.push(b'\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| ContractError::sink_delivery(&self.name, "file sink closed"))?;

        let result = async {
            writer.write_all(&line).await?;
            writer.flush().await
        }
        .await;

        result.map_err(|e| {
            error!(sink = %self.name, event_id = %event.id(), error = %e, "Write failed");
            ContractError::sink_delivery(&self.name, e.to_string())
        })?;

        debug!(sink = %self.name, event_id = %event.id(), bytes = line.len(), "Appended");
        Ok(())
    }
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, event_id = %event.id())
    )]
    async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
        self.send(event, &Document::Envelope(EventEnvelope::from_event(event)))
            .await
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.lock().await.as_mut() {
            writer
                .flush()
                .await
                .map_err(|e| ContractError::sink_delivery(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer
                .shutdown()
                .await
                .map_err(|e| ContractError::sink_delivery(&self.name, e.to_string()))?;
        }
        debug!(sink = %self.name, path = %self.path.display(), "FileSink closed");
        Ok(())
    }
}
