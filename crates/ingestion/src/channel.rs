//! In-process event channel
//!
//! `EventPublisher` is the producer half, cloneable across tasks;
//! `ChannelSource` is the dispatcher-facing half. The source reports closed
//! once every publisher is dropped and the buffer is drained.

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use bytes::Bytes;
use tracing::trace;

use contracts::{ContractError, Event, EventId, EventSource};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// Create a bounded publisher/source pair
pub fn channel(name: impl Into<String>, capacity: usize) -> (EventPublisher, ChannelSource) {
    let name = name.into();
    let (tx, rx) = bounded(capacity.max(1));
    let metrics = Arc::new(IngestionMetrics::new());

    (
        EventPublisher {
            name: name.clone(),
            tx,
            metrics: Arc::clone(&metrics),
        },
        ChannelSource { name, rx, metrics },
    )
}

/// Producer half
#[derive(Debug, Clone)]
pub struct EventPublisher {
    name: String,
    tx: Sender<Event>,
    metrics: Arc<IngestionMetrics>,
}

impl EventPublisher {
    /// Publish an event, waiting while the buffer is full
    pub async fn publish(&self, event: Event) -> Result<()> {
        trace!(source = %self.name, event_id = %event.id(), "publish");
        self.tx
            .send(event)
            .await
            .map_err(|_| IngestionError::ChannelClosed {
                source_name: self.name.clone(),
            })?;
        self.metrics.record_received();
        Ok(())
    }

    /// Publish a payload as a new event
    pub async fn publish_payload(
        &self,
        id: impl Into<EventId>,
        payload: impl Into<Bytes>,
    ) -> Result<()> {
        self.publish(Event::new(id, payload)).await
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// Close the channel for every publisher clone
    pub fn close(&self) {
        self.tx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Dispatcher-facing half
#[derive(Debug)]
pub struct ChannelSource {
    name: String,
    rx: Receiver<Event>,
    metrics: Arc<IngestionMetrics>,
}

impl ChannelSource {
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// Events waiting in the buffer
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl EventSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> std::result::Result<Option<Event>, ContractError> {
        // Err only means closed and drained
        Ok(self.rx.recv().await.ok())
    }
}
