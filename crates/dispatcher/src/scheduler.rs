//! Scheduler state
//!
//! Owned by the dispatcher loop alone: retry queue, in-flight bookkeeping,
//! outcome ledger and dead letters never leave this task.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use contracts::{BackoffPolicy, DeadLetter, DeliveryOutcome, Event, EventId};
use observability::{
    record_dead_letter, record_delivery, record_duplicate_delivery, record_in_flight,
    record_retry_queue_depth, DeliveryStatsAggregator,
};
use tokio_util::time::DelayQueue;
use tracing::{debug, warn};

use crate::dead_letter::DeadLetterStore;
use crate::ledger::OutcomeLedger;
use crate::metrics::SinkMetrics;
use crate::worker::{CycleReport, Job};

/// Scheduled retries allowed per worker before intake pauses
const RETRY_BACKLOG_PER_WORKER: usize = 64;

/// An (event, sink) pair left pending when the drain gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedDelivery {
    pub event_id: EventId,
    pub sink_id: String,
    /// Attempts already made
    pub attempts: u32,
}

#[derive(Debug)]
struct InFlight {
    event_id: EventId,
    attempts: u32,
    pending: Vec<usize>,
}

pub(crate) struct Scheduler {
    names: Vec<String>,
    metrics: Vec<Arc<SinkMetrics>>,
    workers: usize,
    max_attempts: u32,
    retry_policy: BackoffPolicy,
    next_seq: u64,
    in_flight: HashMap<u64, InFlight>,
    pub(crate) retry_queue: DelayQueue<u64>,
    scheduled: HashMap<u64, Job>,
    ready: VecDeque<Job>,
    pub(crate) ledger: OutcomeLedger,
    pub(crate) dead_letters: DeadLetterStore,
    pub(crate) stats: DeliveryStatsAggregator,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        names: Vec<String>,
        metrics: Vec<Arc<SinkMetrics>>,
        workers: usize,
        max_attempts: u32,
        retry_policy: BackoffPolicy,
        outcome_history: usize,
        dead_letters: DeadLetterStore,
    ) -> Self {
        Self {
            names,
            metrics,
            workers,
            max_attempts,
            retry_policy,
            next_seq: 0,
            in_flight: HashMap::new(),
            retry_queue: DelayQueue::new(),
            scheduled: HashMap::new(),
            ready: VecDeque::new(),
            ledger: OutcomeLedger::new(outcome_history),
            dead_letters,
            stats: DeliveryStatsAggregator::new(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// A worker is free to take another job
    pub(crate) fn has_capacity(&self) -> bool {
        self.in_flight.len() < self.workers
    }

    /// The retry backlog can take more failures
    pub(crate) fn has_retry_room(&self) -> bool {
        self.scheduled.len() < self.workers * RETRY_BACKLOG_PER_WORKER
    }

    /// Jobs are waiting for a free worker
    pub(crate) fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Nothing in flight, scheduled or waiting
    pub(crate) fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.scheduled.is_empty() && self.ready.is_empty()
    }

    /// Queue a freshly received event for every sink
    pub(crate) fn accept(&mut self, event: Event) {
        let seq = self.next_seq();
        self.ready.push_back(Job {
            seq,
            event,
            pending: (0..self.names.len()).collect(),
        });
    }

    /// Move an expired retry to the ready queue
    pub(crate) fn release(&mut self, seq: u64) {
        if let Some(job) = self.scheduled.remove(&seq) {
            debug!(event_id = %job.event.id(), sinks = job.pending.len(), "Retry due");
            self.ready.push_back(job);
        }
        record_retry_queue_depth(self.scheduled.len());
    }

    /// Hand ready jobs to workers while there is capacity
    pub(crate) fn dispatch_ready(&mut self, jobs: &async_channel::Sender<Job>) {
        while self.has_capacity() {
            let Some(job) = self.ready.pop_front() else {
                break;
            };
            // The worker opens the next attempt before delivering
            let in_flight = InFlight {
                event_id: job.event.id().clone(),
                attempts: job.event.attempts() + 1,
                pending: job.pending.clone(),
            };
            let seq = job.seq;
            match jobs.try_send(job) {
                Ok(()) => {
                    self.in_flight.insert(seq, in_flight);
                }
                Err(e) => {
                    warn!(error = %e, "Worker queue unavailable");
                    self.ready.push_front(e.into_inner());
                    break;
                }
            }
        }
        record_in_flight(self.in_flight.len());
    }

    /// Apply the results of one delivery cycle
    pub(crate) fn complete(&mut self, report: CycleReport) {
        self.in_flight.remove(&report.seq);

        let event = report.event;
        let attempt = event.attempts();
        let sink_count = self.names.len();
        let mut retry = Vec::new();

        for result in report.results {
            let name = &self.names[result.sink];
            let metrics = &self.metrics[result.sink];
            metrics.inc_attempts();

            let outcome = match result.result {
                Ok(()) => {
                    metrics.inc_delivered();
                    debug!(event_id = %event.id(), sink = %name, attempt, "Delivered");
                    DeliveryOutcome::delivered(event.id().clone(), name, attempt)
                }
                Err(failure) if failure.retryable && attempt < self.max_attempts => {
                    metrics.inc_retried();
                    warn!(
                        event_id = %event.id(),
                        sink = %name,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %failure.message,
                        "Delivery failed, will retry"
                    );
                    retry.push(result.sink);
                    DeliveryOutcome::retrying(event.id().clone(), name, attempt, failure.message)
                }
                Err(failure) => {
                    if !failure.retryable {
                        warn!(
                            event_id = %event.id(),
                            sink = %name,
                            attempt,
                            error = %failure.message,
                            "Delivery rejected, not retrying"
                        );
                    }
                    metrics.inc_failed();
                    metrics.inc_dead_lettered();
                    record_dead_letter(name);
                    self.dead_letters
                        .push(DeadLetter::from_event(&event, name, failure.message.as_str()));
                    DeliveryOutcome::failed(event.id().clone(), name, attempt, failure.message)
                }
            };

            let latency_ms = result.latency.as_secs_f64() * 1000.0;
            record_delivery(name, outcome.status, latency_ms);
            self.stats.update(&outcome, latency_ms);
            if !self.ledger.record(outcome, sink_count) {
                record_duplicate_delivery(name);
            }
        }

        if !retry.is_empty() {
            let delay = self.retry_policy.delay_for(attempt);
            let seq = self.next_seq();
            debug!(event_id = %event.id(), sinks = retry.len(), ?delay, "Retry scheduled");
            self.retry_queue.insert(seq, delay);
            self.scheduled.insert(
                seq,
                Job {
                    seq,
                    event,
                    pending: retry,
                },
            );
        }

        record_retry_queue_depth(self.scheduled.len());
        record_in_flight(self.in_flight.len());
    }

    /// Everything still pending, emptying the scheduler
    pub(crate) fn abandon(&mut self) -> Vec<AbandonedDelivery> {
        let mut abandoned = Vec::new();

        for flight in self.in_flight.drain().map(|(_, f)| f) {
            for sink in flight.pending {
                abandoned.push(AbandonedDelivery {
                    event_id: flight.event_id.clone(),
                    sink_id: self.names[sink].clone(),
                    attempts: flight.attempts,
                });
            }
        }

        let waiting = self.scheduled.drain().map(|(_, job)| job);
        for job in waiting.chain(self.ready.drain(..)) {
            for sink in job.pending {
                abandoned.push(AbandonedDelivery {
                    event_id: job.event.id().clone(),
                    sink_id: self.names[sink].clone(),
                    attempts: job.event.attempts(),
                });
            }
        }
        self.retry_queue.clear();

        for item in &abandoned {
            warn!(
                event_id = %item.event_id,
                sink = %item.sink_id,
                attempts = item.attempts,
                "Delivery abandoned"
            );
        }
        abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{DeliveryFailure, SinkResult};
    use contracts::DeliveryStatus;
    use std::time::Duration;

    fn scheduler(max_attempts: u32) -> Scheduler {
        Scheduler::new(
            vec!["a".into(), "b".into()],
            vec![Arc::new(SinkMetrics::new()), Arc::new(SinkMetrics::new())],
            2,
            max_attempts,
            BackoffPolicy::fixed(Duration::from_secs(1)),
            100,
            DeadLetterStore::in_memory(10),
        )
    }

    fn down(retryable: bool) -> DeliveryFailure {
        DeliveryFailure {
            message: "down".into(),
            retryable,
        }
    }

    fn report(seq: u64, attempts: u32, results: Vec<(usize, bool)>) -> CycleReport {
        let mut event = Event::new("evt-1", "{}");
        for _ in 0..attempts {
            event.begin_attempt();
        }
        CycleReport {
            seq,
            event,
            results: results
                .into_iter()
                .map(|(sink, ok)| SinkResult {
                    sink,
                    result: if ok { Ok(()) } else { Err(down(true)) },
                    latency: Duration::from_millis(3),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_failed_sink_is_rescheduled_alone() {
        let mut s = scheduler(3);
        s.complete(report(1, 1, vec![(0, true), (1, false)]));

        assert_eq!(s.scheduled.len(), 1);
        let job = s.scheduled.values().next().unwrap();
        assert_eq!(job.pending, vec![1]);
        assert_eq!(s.metrics[1].retried(), 1);
        assert!(!s.is_idle());
    }

    #[tokio::test]
    async fn test_exhausted_pair_is_dead_lettered() {
        let mut s = scheduler(2);
        s.complete(report(1, 2, vec![(1, false)]));

        assert!(s.is_idle());
        assert_eq!(s.dead_letters.total(), 1);
        assert_eq!(s.ledger.failed(), 1);
        assert_eq!(s.metrics[1].dead_lettered(), 1);
    }

    #[tokio::test]
    async fn test_abandon_lists_pending_pairs() {
        let mut s = scheduler(3);
        s.accept(Event::new("evt-2", "{}"));
        s.complete(report(9, 1, vec![(0, false), (1, false)]));

        let abandoned = s.abandon();
        assert_eq!(abandoned.len(), 4);
        assert!(s.is_idle());
        assert!(s.retry_queue.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_pair_is_not_retried() {
        let mut s = scheduler(3);
        let mut cycle = report(1, 1, vec![(0, true)]);
        cycle.results.push(SinkResult {
            sink: 1,
            result: Err(down(false)),
            latency: Duration::from_millis(3),
        });
        s.complete(cycle);

        assert!(s.is_idle());
        assert_eq!(s.metrics[1].retried(), 0);
        assert_eq!(s.dead_letters.total(), 1);
        let statuses: Vec<_> = s
            .ledger
            .history()
            .filter(|o| o.sink_id == "b")
            .map(|o| (o.status, o.attempts))
            .collect();
        assert_eq!(statuses, vec![(DeliveryStatus::Failed, 1)]);
    }

    #[tokio::test]
    async fn test_in_flight_abandon_counts_open_attempt() {
        let mut s = scheduler(3);
        let (jobs, _rx) = async_channel::bounded(2);
        s.accept(Event::new("evt-3", "{}"));
        s.dispatch_ready(&jobs);

        let abandoned = s.abandon();
        assert_eq!(abandoned.len(), 2);
        assert!(abandoned.iter().all(|a| a.attempts == 1));
    }

    #[tokio::test]
    async fn test_retry_backlog_pauses_intake() {
        let mut s = scheduler(3);
        let limit = 2 * RETRY_BACKLOG_PER_WORKER;
        for seq in 0..limit as u64 {
            assert!(s.has_retry_room());
            s.complete(report(seq, 1, vec![(0, false)]));
        }

        assert_eq!(s.scheduled.len(), limit);
        assert!(!s.has_retry_room());

        let seq = *s.scheduled.keys().next().unwrap();
        s.release(seq);
        assert!(s.has_retry_room());
    }
}
