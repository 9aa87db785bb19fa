//! OutcomeLedger - bounded outcome history with duplicate protection

use std::collections::{HashMap, HashSet, VecDeque};

use contracts::{DeliveryOutcome, DeliveryStatus, EventId};
use tracing::warn;

/// Sinks of one event that reached a terminal state
#[derive(Debug, Default)]
struct EventProgress {
    delivered: HashSet<String>,
    terminal: usize,
}

/// Records every outcome and guards the at-most-once `Delivered` rule
#[derive(Debug)]
pub struct OutcomeLedger {
    history: VecDeque<DeliveryOutcome>,
    capacity: usize,
    open: HashMap<EventId, EventProgress>,
    delivered: u64,
    retried: u64,
    failed: u64,
    duplicates: u64,
}

impl OutcomeLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            open: HashMap::new(),
            delivered: 0,
            retried: 0,
            failed: 0,
            duplicates: 0,
        }
    }

    /// Record an outcome for an event fanned out to `sink_count` sinks
    ///
    /// Returns `false` when a second `Delivered` for the same pair is
    /// refused.
    pub fn record(&mut self, outcome: DeliveryOutcome, sink_count: usize) -> bool {
        let progress = self.open.entry(outcome.event_id.clone()).or_default();

        match outcome.status {
            DeliveryStatus::Delivered => {
                if !progress.delivered.insert(outcome.sink_id.clone()) {
                    warn!(
                        event_id = %outcome.event_id,
                        sink = %outcome.sink_id,
                        "Refusing duplicate delivered outcome"
                    );
                    self.duplicates += 1;
                    return false;
                }
                progress.terminal += 1;
                self.delivered += 1;
            }
            DeliveryStatus::Failed => {
                progress.terminal += 1;
                self.failed += 1;
            }
            DeliveryStatus::Retrying => self.retried += 1,
        }

        if progress.terminal >= sink_count {
            self.open.remove(&outcome.event_id);
        }

        if self.capacity > 0 {
            if self.history.len() == self.capacity {
                self.history.pop_front();
            }
            self.history.push_back(outcome);
        }
        true
    }

    /// Events with at least one sink still pending
    pub fn open_events(&self) -> usize {
        self.open.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.history.iter()
    }

    pub fn into_history(self) -> Vec<DeliveryOutcome> {
        self.history.into()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn retried(&self) -> u64 {
        self.retried
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}
