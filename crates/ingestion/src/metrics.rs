//! Source-side counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics, shared between a source and its reader tasks
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Events decoded and handed to the dispatcher side
    pub events_received: AtomicU64,

    /// Lines that were not valid events
    pub decode_errors: AtomicU64,

    /// TCP connections accepted
    pub connections: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub decode_errors: u64,
    pub connections: u64,
}
