//! Delivery workers
//!
//! A worker owns one `Job` at a time: it opens a new delivery cycle on the
//! event, delivers to every pending sink concurrently and hands the event
//! back to the scheduler together with the per-sink results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, Event, EventSink};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, instrument};

/// One event and the sinks it still has to reach
#[derive(Debug)]
pub(crate) struct Job {
    pub seq: u64,
    pub event: Event,
    /// Indices into the dispatcher's sink list
    pub pending: Vec<usize>,
}

/// Why one delivery attempt failed
#[derive(Debug)]
pub(crate) struct DeliveryFailure {
    pub message: String,
    /// False when another attempt would fail the same way
    pub retryable: bool,
}

impl From<ContractError> for DeliveryFailure {
    fn from(error: ContractError) -> Self {
        Self {
            retryable: error.is_retryable(),
            message: error.to_string(),
        }
    }
}

/// Result of one delivery attempt
#[derive(Debug)]
pub(crate) struct SinkResult {
    pub sink: usize,
    pub result: Result<(), DeliveryFailure>,
    pub latency: Duration,
}

/// A finished cycle, sent back to the scheduler
#[derive(Debug)]
pub(crate) struct CycleReport {
    pub seq: u64,
    pub event: Event,
    pub results: Vec<SinkResult>,
}

/// Pull jobs until the channel closes or the scheduler goes away
#[instrument(name = "dispatcher_worker", skip_all, fields(worker = id))]
pub(crate) async fn run_worker<S>(
    id: usize,
    jobs: async_channel::Receiver<Job>,
    reports: mpsc::UnboundedSender<CycleReport>,
    sinks: Arc<[Arc<S>]>,
    delivery_timeout: Duration,
) where
    S: EventSink + Send + Sync + 'static,
{
    while let Ok(job) = jobs.recv().await {
        let report = run_cycle(job, &sinks, delivery_timeout).await;
        if reports.send(report).is_err() {
            break;
        }
    }
    debug!(worker = id, "Worker stopped");
}

/// Deliver to every pending sink of the job
///
/// Deliveries live in a `JoinSet` owned by the cycle, so dropping the cycle
/// (an aborted worker) cancels every delivery still running.
async fn run_cycle<S>(mut job: Job, sinks: &[Arc<S>], delivery_timeout: Duration) -> CycleReport
where
    S: EventSink + Send + Sync + 'static,
{
    job.event.begin_attempt();
    let event = Arc::new(job.event);

    let mut deliveries = JoinSet::new();
    let mut task_sinks = HashMap::with_capacity(job.pending.len());
    for &index in &job.pending {
        let sink = Arc::clone(&sinks[index]);
        let event = Arc::clone(&event);
        let handle = deliveries.spawn(async move {
            let started = Instant::now();
            let result = match timeout(delivery_timeout, sink.deliver(&event)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(DeliveryFailure::from(e)),
                Err(_) => Err(DeliveryFailure::from(ContractError::SinkTimeout {
                    sink_name: sink.name().to_string(),
                    timeout: delivery_timeout,
                })),
            };
            (result, started.elapsed())
        });
        task_sinks.insert(handle.id(), index);
    }

    let mut results = Vec::with_capacity(task_sinks.len());
    while let Some(joined) = deliveries.join_next_with_id().await {
        let (id, (result, latency)) = match joined {
            Ok(done) => done,
            Err(e) => {
                let failure = DeliveryFailure {
                    message: format!("delivery task failed: {e}"),
                    retryable: true,
                };
                (e.id(), (Err(failure), Duration::ZERO))
            }
        };
        if let Some(&sink) = task_sinks.get(&id) {
            results.push(SinkResult {
                sink,
                result,
                latency,
            });
        }
    }
    results.sort_by_key(|r| r.sink);

    CycleReport {
        seq: job.seq,
        event: Arc::unwrap_or_clone(event),
        results,
    }
}
