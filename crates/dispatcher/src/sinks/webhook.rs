//! WebhookSink - HTTP POST per document

use std::collections::HashMap;
use std::time::Duration;

use contracts::{ContractError, Event, EventSink};
use tracing::{debug, instrument, warn};

use crate::payload::{Document, EventEnvelope};

/// Header carrying the event id
pub const EVENT_ID_HEADER: &str = "X-Notifier-Event-Id";
/// Header carrying the delivery attempt (1-based)
pub const ATTEMPT_HEADER: &str = "X-Notifier-Attempt";

/// Configuration for WebhookSink
#[derive(Debug, Clone)]
pub struct WebhookSinkConfig {
    /// Destination, `http://` or `https://`
    pub url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl WebhookSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let url = params
            .get("url")
            .ok_or_else(|| "missing 'url' parameter".to_string())?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("'{}' is not an http(s) url", url));
        }

        let timeout_ms: u64 = match params.get("timeout_ms") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid timeout_ms '{}': {}", raw, e))?,
            None => 10_000,
        };

        Ok(Self {
            url: url.clone(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Sink that POSTs each document as JSON
///
/// Any non-2xx answer is a delivery error.
pub struct WebhookSink {
    name: String,
    config: WebhookSinkConfig,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(name: impl Into<String>, config: WebhookSinkConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("events-notifier/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            name: name.into(),
            config,
            client,
        })
    }

    /// Create from sink params
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = WebhookSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.url"), e))?;

        Self::new(name.clone(), config)
            .map_err(|e| ContractError::sink_delivery(name, e.to_string()))
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// POST one document for `event`
    pub async fn send(&self, event: &Event, document: &Document) -> Result<(), ContractError> {
        let response = self
            .client
            .post(&self.config.url)
            .header(EVENT_ID_HEADER, event.id().as_str())
            .header(ATTEMPT_HEADER, event.attempts().to_string())
            .json(document)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request timed out after {:?}", self.config.timeout)
                } else {
                    format!("request failed: {e}")
                };
                ContractError::sink_delivery(&self.name, message)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(sink = %self.name, event_id = %event.id(), status = status.as_u16(), "Webhook rejected");
            return Err(ContractError::sink_delivery(
                &self.name,
                format!("unexpected status {status}"),
            ));
        }

        debug!(sink = %self.name, event_id = %event.id(), status = status.as_u16(), "Posted");
        Ok(())
    }
}

impl EventSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "webhook_sink_deliver",
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

    async fn close(&self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "WebhookSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one request with `status`, handing the raw request back
    async fn serve_once(status: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let reply = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(reply.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
        });

        (url, rx)
    }

    fn sink(url: String) -> WebhookSink {
        WebhookSink::new(
            "hook",
            WebhookSinkConfig {
                url,
                timeout: Duration::from_secs(5),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_webhook_posts_envelope() {
        let (url, request) = serve_once("200 OK").await;
        let mut event = Event::new("evt-7", r#"{"x":1}"#);
        event.begin_attempt();

        sink(url).deliver(&event).await.unwrap();

        let request = request.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /hook"));
        assert!(lower.contains("x-notifier-event-id: evt-7"));
        assert!(lower.contains("x-notifier-attempt: 1"));
        assert!(request.contains(r#""id":"evt-7""#));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (url, _request) = serve_once("500 Internal Server Error").await;

        let err = sink(url)
            .deliver(&Event::new("evt-8", "{}"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"), "got: {err}");
    }

    #[test]
    fn test_config_rejects_non_http_url() {
        let mut params = HashMap::new();
        params.insert("url".to_string(), "ftp://example.org".to_string());
        assert!(WebhookSinkConfig::from_params(&params).is_err());

        params.insert("url".to_string(), "https://example.org/hook".to_string());
        params.insert("timeout_ms".to_string(), "250".to_string());
        let config = WebhookSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
    }
}
