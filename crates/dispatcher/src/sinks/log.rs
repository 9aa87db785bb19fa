//! LogSink - logs delivered documents via tracing

use contracts::{ContractError, Event, EventSink};
use tracing::{info, instrument};

use crate::payload::{Document, EventEnvelope};

/// Sink that logs each document, for debugging and dry runs
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Log one document for `event`
    pub async fn send(&self, event: &Event, document: &Document) -> Result<(), ContractError> {
        match document {
            Document::Envelope(envelope) => info!(
                sink = %self.name,
                event_id = %event.id(),
                attempt = event.attempts(),
                bytes = envelope.payload.len(),
                "Event delivered"
            ),
            Document::Notification(notification) => info!(
                sink = %self.name,
                event_id = %event.id(),
                attempt = event.attempts(),
                subject = %notification.subject,
                template = %notification.template,
                to = ?notification.to,
                "Notification delivered"
            ),
        }
        Ok(())
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, event_id = %event.id())
    )]
    async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
        self.send(event, &Document::Envelope(EventEnvelope::from_event(event)))
            .await
    }

    async fn flush(&self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_deliver() {
        let sink = LogSink::new("test_log");
        let event = Event::new("evt-1", "{}");
        assert!(sink.deliver(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
