//! NetworkSink - one UDP datagram per document

use std::collections::HashMap;
use std::net::SocketAddr;

use contracts::{ContractError, Event, EventSink};
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, instrument, warn};

use crate::payload::{Document, EventEnvelope};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target `host:port`, resolved when the sink is created
    pub addr: String,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max datagram size (UDP allows 65507 bytes over IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?
            .clone();

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", raw, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends documents over UDP
///
/// A datagram that leaves the socket counts as delivered; UDP gives no
/// receipt beyond that.
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    target: SocketAddr,
    socket: UdpSocket,
}

impl NetworkSink {
    /// Resolve the target and connect a local socket to it
    #[instrument(name = "network_sink_new", skip(name, config), fields(addr = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let target = lookup_host(config.addr.as_str()).await?.next().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address for '{}'", config.addr),
            )
        })?;

        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        debug!(sink = %name, %target, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            target,
            socket,
        })
    }

    /// Create from sink params
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.addr"), e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_delivery(name, e.to_string()))
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    fn encode(&self, document: &Document) -> Result<Vec<u8>, ContractError> {
        let data = match self.config.format {
            NetworkFormat::Json => {
                serde_json::to_vec(document).map_err(|e| format!("json error: {}", e))
            }
            NetworkFormat::Bincode => {
                bincode::serialize(document).map_err(|e| format!("bincode error: {}", e))
            }
        }
        .map_err(|e| ContractError::sink_rejected(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large"
            );
            return Err(ContractError::sink_rejected(
                &self.name,
                format!(
                    "packet of {} bytes exceeds {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        Ok(data)
    }

    /// Send one document for `event`
    pub async fn send(&self, event: &Event, document: &Document) -> Result<(), ContractError> {
        let data = self.encode(document)?;
        let sent = self
            .socket
            .send(&data)
            .await
            .map_err(|e| ContractError::sink_delivery(&self.name, format!("udp send: {e}")))?;

        debug!(sink = %self.name, event_id = %event.id(), bytes = sent, "Sent");
        Ok(())
    }
}

impl EventSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, event_id = %event.id())
    )]
    async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
        self.send(event, &Document::Envelope(EventEnvelope::from_event(event)))
            .await
    }

    async fn flush(&self) -> Result<(), ContractError> {
        // UDP doesn't buffer
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_sink_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "bincode".to_string());

        let config = NetworkSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.addr, "127.0.0.1:9999");
        assert_eq!(config.format, NetworkFormat::Bincode);
        assert_eq!(config.max_packet_size, 65000);

        params.insert("format".to_string(), "xml".to_string());
        assert!(NetworkSinkConfig::from_params(&params).is_err());
    }

    #[tokio::test]
    async fn test_network_sink_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap().to_string(),
            format: NetworkFormat::Json,
            max_packet_size: 65000,
        };
        let sink = NetworkSink::new("test_net", config).await.unwrap();

        sink.deliver(&Event::new("evt-9", r#"{"k":"v"}"#))
            .await
            .unwrap();

        let mut buf = vec![0u8; 2048];
        let n = receiver.recv(&mut buf).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(json["id"], "evt-9");
        assert_eq!(json["payload"], r#"{"k":"v"}"#);
    }

    #[tokio::test]
    async fn test_oversized_packet_is_rejected() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap().to_string(),
            format: NetworkFormat::Json,
            max_packet_size: 16,
        };
        let sink = NetworkSink::new("tiny", config).await.unwrap();

        let err = sink
            .deliver(&Event::new("evt-1", "a payload longer than sixteen bytes"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::SinkRejected { .. }));
        assert!(!err.is_retryable());
    }
}
