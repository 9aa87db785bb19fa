//! Dispatcher - scheduler loop fanning events out to sinks

use std::future::poll_fn;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    BackoffPolicy, DeadLetter, DeadLetterConfig, DeliveryOutcome, DispatchConfig, EventSink,
    EventSource, NotifierBlueprint, SinkConfig,
};
use observability::{record_event_received, record_source_error, DeliverySummary};
use rules::RuleEngine;

use crate::dead_letter::DeadLetterStore;
use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::scheduler::{AbandonedDelivery, Scheduler};
use crate::sinks::ConfiguredSink;
use crate::worker::run_worker;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Concurrent delivery cycles
    pub workers: usize,
    /// Attempt ceiling per (event, sink) pair
    pub max_attempts: u32,
    pub retry_policy: BackoffPolicy,
    /// Upper bound for a single delivery attempt
    pub delivery_timeout: Duration,
    /// How long a cancelled run keeps draining
    pub drain_grace: Duration,
    pub outcome_history: usize,
    pub dead_letter_capacity: usize,
    pub dead_letter_path: Option<PathBuf>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_blueprint(&DispatchConfig::default(), &DeadLetterConfig::default())
    }
}

impl DispatcherConfig {
    pub fn from_blueprint(dispatch: &DispatchConfig, dead_letter: &DeadLetterConfig) -> Self {
        Self {
            workers: dispatch.workers.max(1),
            max_attempts: dispatch.max_attempts.max(1),
            retry_policy: dispatch.retry_policy(),
            delivery_timeout: dispatch.delivery_timeout(),
            drain_grace: dispatch.drain_grace(),
            outcome_history: dispatch.outcome_history,
            dead_letter_capacity: dead_letter.capacity,
            dead_letter_path: dead_letter.path.clone(),
        }
    }
}

/// What a dispatcher run did
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub events_received: u64,
    pub source_errors: u64,
    /// Most recent outcomes, bounded by `outcome_history`
    pub outcomes: Vec<DeliveryOutcome>,
    /// Most recent dead letters, bounded by the dead-letter capacity
    pub dead_letters: Vec<DeadLetter>,
    pub dead_letter_total: u64,
    /// Pairs still pending when the drain gave up
    pub abandoned: Vec<AbandonedDelivery>,
    pub delivered: u64,
    pub failed: u64,
    pub retried: u64,
    /// Refused second `Delivered` outcomes
    pub duplicates: u64,
    /// Run ended through cancellation
    pub cancelled: bool,
    pub elapsed: Duration,
    pub summary: DeliverySummary,
}

impl DispatchReport {
    /// Outcomes recorded for one event, oldest first
    pub fn outcomes_for<'a>(&'a self, event_id: &'a str) -> impl Iterator<Item = &'a DeliveryOutcome> {
        self.outcomes.iter().filter(move |o| o.event_id == event_id)
    }

    /// Every pair reached `Delivered`
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.abandoned.is_empty()
    }
}

/// Builder for creating a Dispatcher from configuration
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    sinks: Vec<SinkConfig>,
    engine: Option<Arc<RuleEngine>>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, sinks: Vec<SinkConfig>) -> Self {
        Self {
            config,
            sinks,
            engine: None,
        }
    }

    /// Rule engine for sinks in `notification` format
    pub fn with_rules(mut self, engine: Arc<RuleEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Create every sink and assemble the dispatcher
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.sinks.len())
    )]
    pub async fn build(self) -> Result<Dispatcher<ConfiguredSink>, DispatcherError> {
        if self.sinks.is_empty() {
            return Err(DispatcherError::NoSinks);
        }

        let mut sinks = Vec::with_capacity(self.sinks.len());
        for config in &self.sinks {
            let sink = ConfiguredSink::from_config(config, self.engine.clone())
                .await
                .map_err(|e| match e {
                    e if e.is_config() => DispatcherError::Contract(e),
                    e => DispatcherError::sink_creation(&config.name, e.to_string()),
                })?;
            sinks.push(sink);
        }

        Ok(Dispatcher::new(self.config, sinks))
    }
}

/// Fans events out to sinks with retries and dead-lettering
pub struct Dispatcher<S> {
    config: DispatcherConfig,
    sinks: Arc<[Arc<S>]>,
    names: Vec<String>,
    metrics: Vec<Arc<SinkMetrics>>,
}

impl<S> Dispatcher<S>
where
    S: EventSink + Send + Sync + 'static,
{
    /// Create a dispatcher over ready-made sinks
    pub fn new(config: DispatcherConfig, sinks: Vec<S>) -> Self {
        let names = sinks.iter().map(|s| s.name().to_string()).collect();
        let metrics = sinks.iter().map(|_| Arc::new(SinkMetrics::new())).collect();
        let sinks: Vec<Arc<S>> = sinks.into_iter().map(Arc::new).collect();

        Self {
            config,
            sinks: sinks.into(),
            names,
            metrics,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn sink_names(&self) -> &[String] {
        &self.names
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.names
            .iter()
            .zip(&self.metrics)
            .map(|(name, m)| (name.clone(), m.snapshot()))
            .collect()
    }

    /// Run until the source closes or `cancel` fires, then drain
    ///
    /// After cancellation no new events are pulled; in-flight cycles and
    /// scheduled retries get `drain_grace` to finish. A closed source drains
    /// without a time limit. Sinks are closed before returning.
    #[instrument(
        name = "dispatcher_run",
        skip_all,
        fields(source = %source.name(), sinks = self.sinks.len())
    )]
    pub async fn run<Src>(
        &self,
        mut source: Src,
        cancel: CancellationToken,
    ) -> Result<DispatchReport, DispatcherError>
    where
        Src: EventSource + Send,
    {
        let dead_letters = match &self.config.dead_letter_path {
            Some(path) => DeadLetterStore::with_file(self.config.dead_letter_capacity, path)?,
            None => DeadLetterStore::in_memory(self.config.dead_letter_capacity),
        };
        let mut state = Scheduler::new(
            self.names.clone(),
            self.metrics.clone(),
            self.config.workers,
            self.config.max_attempts,
            self.config.retry_policy.clone(),
            self.config.outcome_history,
            dead_letters,
        );

        let (job_tx, job_rx) = async_channel::bounded(self.config.workers);
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            workers.spawn(run_worker(
                id,
                job_rx.clone(),
                report_tx.clone(),
                Arc::clone(&self.sinks),
                self.config.delivery_timeout,
            ));
        }
        drop(job_rx);
        drop(report_tx);

        info!(
            workers = self.config.workers,
            max_attempts = self.config.max_attempts,
            "Dispatcher started"
        );

        let started = Instant::now();
        let source_name = source.name().to_string();
        let mut events_received: u64 = 0;
        let mut source_errors: u64 = 0;
        let mut pulling = true;
        let mut drain_deadline: Option<Instant> = None;
        let mut grace_elapsed = false;

        loop {
            state.dispatch_ready(&job_tx);

            if !pulling && state.is_idle() {
                break;
            }

            let can_pull =
                pulling && state.has_capacity() && !state.has_ready() && state.has_retry_room();
            let deadline = drain_deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if drain_deadline.is_none() => {
                    info!(grace = ?self.config.drain_grace, "Cancellation requested, draining");
                    pulling = false;
                    drain_deadline = Some(Instant::now() + self.config.drain_grace);
                }
                _ = sleep_until(deadline), if drain_deadline.is_some() => {
                    warn!("Drain grace elapsed");
                    grace_elapsed = true;
                    break;
                }
                Some(report) = report_rx.recv() => state.complete(report),
                Some(expired) = poll_fn(|cx| state.retry_queue.poll_expired(cx)), if !state.retry_queue.is_empty() => {
                    state.release(expired.into_inner());
                }
                next = source.next_event(), if can_pull => match next {
                    Ok(Some(event)) => {
                        events_received += 1;
                        record_event_received(&source_name);
                        debug!(event_id = %event.id(), "Event received");
                        state.accept(event);
                    }
                    Ok(None) => {
                        info!(events = events_received, "Source closed, draining");
                        pulling = false;
                    }
                    Err(e) => {
                        source_errors += 1;
                        record_source_error(&source_name);
                        warn!(error = %e, "Source error");
                    }
                },
                else => {
                    error!("Workers stopped unexpectedly");
                    break;
                }
            }
        }

        job_tx.close();
        if grace_elapsed {
            workers.abort_all();
        }
        while workers.join_next().await.is_some() {}

        let abandoned = state.abandon();
        self.close_sinks().await;

        let report = DispatchReport {
            events_received,
            source_errors,
            delivered: state.ledger.delivered(),
            failed: state.ledger.failed(),
            retried: state.ledger.retried(),
            duplicates: state.ledger.duplicates(),
            dead_letter_total: state.dead_letters.total(),
            summary: state.stats.summary(),
            cancelled: drain_deadline.is_some(),
            elapsed: started.elapsed(),
            abandoned,
            outcomes: state.ledger.into_history(),
            dead_letters: state.dead_letters.into_entries(),
        };

        info!(
            events = report.events_received,
            delivered = report.delivered,
            failed = report.failed,
            retried = report.retried,
            abandoned = report.abandoned.len(),
            "Dispatcher stopped"
        );
        Ok(report)
    }

    async fn close_sinks(&self) {
        for sink in self.sinks.iter() {
            if let Err(e) = sink.flush().await {
                warn!(sink = %sink.name(), error = %e, "Flush failed");
            }
            if let Err(e) = sink.close().await {
                warn!(sink = %sink.name(), error = %e, "Close failed");
            }
        }
    }
}

/// Build a dispatcher with every sink of the blueprint
#[instrument(name = "dispatcher_create", skip(blueprint))]
pub async fn create_dispatcher(
    blueprint: &NotifierBlueprint,
) -> Result<Dispatcher<ConfiguredSink>, DispatcherError> {
    let config = DispatcherConfig::from_blueprint(&blueprint.dispatcher, &blueprint.dead_letter);
    let mut builder = DispatcherBuilder::new(config, blueprint.sinks.clone());
    if let Some(rules) = &blueprint.rules {
        builder = builder.with_rules(Arc::new(RuleEngine::new(rules.clone())));
    }
    builder.build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, DeliveryStatus, Event, SinkType};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Sink failing a scripted number of times per event
    struct ScriptedSink {
        name: String,
        failures: u32,
        delay: Duration,
        calls: Mutex<HashMap<String, u32>>,
        /// Deliveries that ran to the end
        completed: AtomicU32,
        closed: AtomicU32,
    }

    impl ScriptedSink {
        fn new(name: &str, failures: u32) -> Self {
            Self {
                name: name.to_string(),
                failures,
                delay: Duration::ZERO,
                calls: Mutex::new(HashMap::new()),
                completed: AtomicU32::new(0),
                closed: AtomicU32::new(0),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl EventSink for ScriptedSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn deliver(&self, event: &Event) -> Result<(), ContractError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(event.id().to_string()).or_insert(0);
                *entry += 1;
                *entry
            };
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            if call <= self.failures {
                Err(ContractError::sink_delivery(&self.name, format!("failure {call}")))
            } else {
                Ok(())
            }
        }

        async fn flush(&self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), ContractError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Finite source over a list of events
    struct VecSource {
        events: VecDeque<Event>,
        /// Stay open after the last event
        hold_open: bool,
    }

    impl VecSource {
        fn new(ids: &[&str]) -> Self {
            Self {
                events: ids.iter().map(|id| Event::new(*id, "{}")).collect(),
                hold_open: false,
            }
        }

        fn held_open(mut self) -> Self {
            self.hold_open = true;
            self
        }
    }

    impl EventSource for VecSource {
        fn name(&self) -> &str {
            "vec"
        }

        async fn next_event(&mut self) -> Result<Option<Event>, ContractError> {
            match self.events.pop_front() {
                Some(event) => Ok(Some(event)),
                None if self.hold_open => {
                    std::future::pending::<()>().await;
                    Ok(None)
                }
                None => Ok(None),
            }
        }
    }

    fn config(max_attempts: u32) -> DispatcherConfig {
        DispatcherConfig {
            workers: 2,
            max_attempts,
            retry_policy: BackoffPolicy::fixed(Duration::from_secs(1)),
            delivery_timeout: Duration::from_secs(5),
            drain_grace: Duration::from_secs(10),
            outcome_history: 1000,
            dead_letter_capacity: 100,
            dead_letter_path: None,
        }
    }

    fn terminal(report: &DispatchReport, event_id: &str, sink: &str) -> (DeliveryStatus, u32) {
        let outcome = report
            .outcomes_for(event_id)
            .filter(|o| o.sink_id == sink && o.status.is_terminal())
            .last()
            .unwrap();
        (outcome.status, outcome.attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_sinks_with_retries() {
        let dispatcher = Dispatcher::new(
            config(3),
            vec![ScriptedSink::new("A", 0), ScriptedSink::new("B", 2)],
        );

        let report = dispatcher
            .run(VecSource::new(&["evt-1"]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(terminal(&report, "evt-1", "A"), (DeliveryStatus::Delivered, 1));
        assert_eq!(terminal(&report, "evt-1", "B"), (DeliveryStatus::Delivered, 3));
        assert_eq!(report.outcomes_for("evt-1").filter(|o| o.sink_id == "A").count(), 1);
        assert_eq!(report.retried, 2);
        assert!(report.is_clean());
        assert!(!report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pair_is_dead_lettered() {
        let dispatcher = Dispatcher::new(config(2), vec![ScriptedSink::new("down", u32::MAX)]);

        let report = dispatcher
            .run(VecSource::new(&["evt-9"]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(terminal(&report, "evt-9", "down"), (DeliveryStatus::Failed, 2));
        assert_eq!(report.dead_letters.len(), 1);
        assert_eq!(report.dead_letters[0].attempts, 2);
        assert_eq!(report.dead_letters[0].event_id, "evt-9");
        assert_eq!(report.failed, 1);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].1.attempts, 2);
        assert_eq!(metrics[0].1.dead_lettered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_pair_delivered_once() {
        let dispatcher = Dispatcher::new(
            config(4),
            vec![ScriptedSink::new("a", 1), ScriptedSink::new("b", 0), ScriptedSink::new("c", 3)],
        );
        let ids: Vec<String> = (0..20).map(|i| format!("evt-{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let report = dispatcher
            .run(VecSource::new(&refs), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.events_received, 20);
        assert_eq!(report.delivered, 60);
        assert_eq!(report.duplicates, 0);
        for outcome in &report.outcomes {
            assert!(outcome.attempts <= 4);
        }
        for id in &refs {
            for sink in ["a", "b", "c"] {
                let delivered = report
                    .outcomes_for(id)
                    .filter(|o| o.sink_id == sink && o.status == DeliveryStatus::Delivered)
                    .count();
                assert_eq!(delivered, 1, "{id}/{sink}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let mut config = config(2);
        config.delivery_timeout = Duration::from_millis(100);
        let dispatcher = Dispatcher::new(
            config,
            vec![ScriptedSink::new("slow", 0).slow(Duration::from_secs(1))],
        );

        let report = dispatcher
            .run(VecSource::new(&["evt-1"]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(terminal(&report, "evt-1", "slow"), (DeliveryStatus::Failed, 2));
        assert!(report.dead_letters[0].error.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_drains_scheduled_retries() {
        let dispatcher = Dispatcher::new(config(3), vec![ScriptedSink::new("B", 1)]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let report = dispatcher
            .run(VecSource::new(&["evt-1"]).held_open(), cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(terminal(&report, "evt-1", "B"), (DeliveryStatus::Delivered, 2));
        assert!(report.abandoned.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_elapsed_reports_abandoned() {
        let mut config = config(5);
        config.retry_policy = BackoffPolicy::fixed(Duration::from_secs(30));
        config.drain_grace = Duration::from_secs(2);
        let dispatcher = Dispatcher::new(config, vec![ScriptedSink::new("B", u32::MAX)]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let report = dispatcher
            .run(VecSource::new(&["evt-1"]).held_open(), cancel)
            .await
            .unwrap();

        assert_eq!(
            report.abandoned,
            vec![AbandonedDelivery {
                event_id: "evt-1".into(),
                sink_id: "B".into(),
                attempts: 1,
            }]
        );
        assert!(report.dead_letters.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_elapsed_cancels_running_delivery() {
        let mut config = config(3);
        config.delivery_timeout = Duration::from_secs(30);
        config.drain_grace = Duration::from_secs(1);
        let dispatcher = Dispatcher::new(
            config,
            vec![ScriptedSink::new("slow", 0).slow(Duration::from_secs(5))],
        );
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let report = dispatcher
            .run(VecSource::new(&["evt-1"]).held_open(), cancel)
            .await
            .unwrap();

        assert_eq!(
            report.abandoned,
            vec![AbandonedDelivery {
                event_id: "evt-1".into(),
                sink_id: "slow".into(),
                attempts: 1,
            }]
        );
        assert!(report.outcomes.is_empty());

        let sink = &dispatcher.sinks[0];
        assert_eq!(sink.completed.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.completed.load(Ordering::SeqCst), 0);
        assert_eq!(sink.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sinks_closed_after_run() {
        let dispatcher = Dispatcher::new(config(1), vec![ScriptedSink::new("a", 0)]);
        dispatcher
            .run(VecSource::new(&[]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(dispatcher.sinks[0].closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_builder_requires_sinks() {
        let err = DispatcherBuilder::new(DispatcherConfig::default(), vec![])
            .build()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::NoSinks));
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_blueprint() {
        let blueprint = NotifierBlueprint {
            sinks: vec![SinkConfig::new("console", SinkType::Log)],
            ..Default::default()
        };

        let dispatcher = create_dispatcher(&blueprint).await.unwrap();
        assert_eq!(dispatcher.sink_names(), ["console".to_string()]);
        assert_eq!(dispatcher.config().workers, blueprint.dispatcher.workers);
    }
}
