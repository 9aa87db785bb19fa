//! ConfiguredSink - a transport paired with a payload format

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use contracts::{ContractError, Event, EventId, EventSink, SinkConfig, SinkType};
use rules::RuleEngine;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::payload::{Document, PayloadRenderer};

use super::{FileSink, LogSink, NetworkSink, WebhookSink};

/// Where documents go
pub enum Transport {
    Log(LogSink),
    File(FileSink),
    Network(NetworkSink),
    Webhook(WebhookSink),
}

impl Transport {
    /// Build the transport for `config`
    pub async fn from_config(config: &SinkConfig) -> Result<Self, ContractError> {
        Ok(match config.sink_type {
            SinkType::Log => Self::Log(LogSink::new(&config.name)),
            SinkType::File => Self::File(FileSink::from_params(&config.name, &config.params).await?),
            SinkType::Network => {
                Self::Network(NetworkSink::from_params(&config.name, &config.params).await?)
            }
            SinkType::Webhook => Self::Webhook(WebhookSink::from_params(&config.name, &config.params)?),
        })
    }

    pub fn kind(&self) -> SinkType {
        match self {
            Self::Log(_) => SinkType::Log,
            Self::File(_) => SinkType::File,
            Self::Network(_) => SinkType::Network,
            Self::Webhook(_) => SinkType::Webhook,
        }
    }

    async fn send(&self, event: &Event, document: &Document) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.send(event, document).await,
            Self::File(sink) => sink.send(event, document).await,
            Self::Network(sink) => sink.send(event, document).await,
            Self::Webhook(sink) => sink.send(event, document).await,
        }
    }

    async fn flush(&self) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.flush().await,
            Self::File(sink) => sink.flush().await,
            Self::Network(sink) => sink.flush().await,
            Self::Webhook(sink) => sink.flush().await,
        }
    }

    async fn close(&self) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.close().await,
            Self::File(sink) => sink.close().await,
            Self::Network(sink) => sink.close().await,
            Self::Webhook(sink) => sink.close().await,
        }
    }
}

/// Events remembered with a partly sent document list
const PARTIAL_SENDS_CAPACITY: usize = 10_000;

/// Documents already sent for events whose delivery stopped part way
#[derive(Default)]
struct PartialSends {
    sent: HashMap<EventId, usize>,
    order: VecDeque<EventId>,
}

impl PartialSends {
    fn sent(&self, id: &EventId) -> usize {
        self.sent.get(id).copied().unwrap_or(0)
    }

    fn record(&mut self, id: &EventId, sent: usize) {
        if self.sent.insert(id.clone(), sent).is_none() {
            self.order.push_back(id.clone());
        }
        while self.order.len() > PARTIAL_SENDS_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.sent.remove(&oldest);
            }
        }
    }

    fn clear(&mut self, id: &EventId) {
        if self.sent.remove(id).is_some() {
            self.order.retain(|known| known != id);
        }
    }
}

/// Sink built from a `SinkConfig`
///
/// An event can render to several documents. When one of them fails, the
/// ones before it are remembered and skipped on the next attempt.
pub struct ConfiguredSink {
    name: String,
    transport: Transport,
    renderer: PayloadRenderer,
    partial: Mutex<PartialSends>,
}

impl ConfiguredSink {
    pub fn new(name: impl Into<String>, transport: Transport, renderer: PayloadRenderer) -> Self {
        Self {
            name: name.into(),
            transport,
            renderer,
            partial: Mutex::new(PartialSends::default()),
        }
    }

    /// Build from configuration
    ///
    /// `engine` is required for sinks in `notification` format.
    #[instrument(
        name = "dispatcher_create_sink",
        skip(config, engine),
        fields(sink = %config.name, sink_type = ?config.sink_type)
    )]
    pub async fn from_config(
        config: &SinkConfig,
        engine: Option<Arc<RuleEngine>>,
    ) -> Result<Self, ContractError> {
        let renderer = PayloadRenderer::new(config.format, engine)
            .map_err(|e| ContractError::config_validation(format!("sinks.{}.format", config.name), e))?;
        let transport = Transport::from_config(config).await?;
        Ok(Self::new(&config.name, transport, renderer))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

impl EventSink for ConfiguredSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
        let documents = self.renderer.render(&self.name, event)?;
        if documents.is_empty() {
            debug!(sink = %self.name, event_id = %event.id(), "No notification for event");
        }

        let already = self.partial.lock().await.sent(event.id());
        if already > 0 {
            debug!(sink = %self.name, event_id = %event.id(), skipped = already, "Resuming partial send");
        }
        for (index, document) in documents.iter().enumerate().skip(already) {
            if let Err(e) = self.transport.send(event, document).await {
                if index > 0 {
                    self.partial.lock().await.record(event.id(), index);
                }
                return Err(e);
            }
        }
        if already > 0 {
            self.partial.lock().await.clear(event.id());
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), ContractError> {
        self.transport.flush().await
    }

    async fn close(&self) -> Result<(), ContractError> {
        self.transport.close().await
    }
}
