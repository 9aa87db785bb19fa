//! TCP listener source
//!
//! Clients connect and write one JSON event per line. Every connection is
//! read by its own task; decoded events are funneled through one bounded
//! channel, so slow consumption pushes back on the writers.

use std::net::SocketAddr;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use contracts::{ContractError, Event, EventSource};

use crate::decode::decode_line;
use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;

/// Listens for line-delimited JSON events
///
/// The listener stops when the source is dropped.
pub struct TcpSource {
    name: String,
    local_addr: SocketAddr,
    rx: Receiver<Event>,
    metrics: Arc<IngestionMetrics>,
    listener: JoinHandle<()>,
}

impl TcpSource {
    /// Bind and start accepting connections
    #[instrument(name = "tcp_source_bind", skip(capacity))]
    pub async fn bind(addr: &str, capacity: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| IngestionError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let name = format!("tcp:{local_addr}");

        let (tx, rx) = bounded(capacity.max(1));
        let metrics = Arc::new(IngestionMetrics::new());
        let listener = tokio::spawn(accept_loop(
            listener,
            tx,
            Arc::clone(&metrics),
            name.clone(),
        ));

        info!(addr = %local_addr, "TCP event source listening");
        Ok(Self {
            name,
            local_addr,
            rx,
            metrics,
            listener,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }
}

impl Drop for TcpSource {
    fn drop(&mut self) {
        // Aborting the listener drops its JoinSet, which aborts every reader
        self.listener.abort();
    }
}

impl EventSource for TcpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> std::result::Result<Option<Event>, ContractError> {
        Ok(self.rx.recv().await.ok())
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: Sender<Event>,
    metrics: Arc<IngestionMetrics>,
    name: String,
) {
    let mut readers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    metrics.record_connection();
                    debug!(source = %name, %peer, "Client connected");
                    readers.spawn(read_connection(
                        stream,
                        peer,
                        tx.clone(),
                        Arc::clone(&metrics),
                        name.clone(),
                    ));
                }
                Err(e) => warn!(source = %name, error = %e, "Accept failed"),
            },
            Some(_) = readers.join_next(), if !readers.is_empty() => {}
        }
    }
}

async fn read_connection(
    stream: TcpStream,
    peer: SocketAddr,
    tx: Sender<Event>,
    metrics: Arc<IngestionMetrics>,
    name: String,
) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(source = %name, %peer, error = %e, "Read failed");
                break;
            }
        };

        match decode_line(&name, &line) {
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    return;
                }
                metrics.record_received();
            }
            Ok(None) => {}
            Err(e) => {
                metrics.record_decode_error();
                warn!(source = %name, %peer, error = %e, "Skipping undecodable line");
            }
        }
    }

    debug!(source = %name, %peer, "Client disconnected");
}
