//! ReadinessGate - block until every dependency accepts connections

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{error, info, instrument, warn};

use contracts::{BackoffPolicy, ContractError, Endpoint, Probe, ReadinessConfig};

/// Result of a single endpoint becoming ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    pub endpoint: Endpoint,
    /// Probes issued, the successful one included
    pub attempts: u32,
    /// Time from gate start until the endpoint was ready
    pub elapsed: Duration,
}

/// Result of a successful gate
#[derive(Debug, Clone, Default)]
pub struct ReadinessReport {
    /// In the order endpoints became ready
    pub endpoints: Vec<EndpointReport>,
    pub elapsed: Duration,
}

impl ReadinessReport {
    pub fn total_attempts(&self) -> u32 {
        self.endpoints.iter().map(|e| e.attempts).sum()
    }
}

/// Probes all endpoints in parallel under one global deadline
pub struct ReadinessGate<P> {
    probe: Arc<P>,
    deadline: Duration,
    backoff: BackoffPolicy,
}

impl<P> ReadinessGate<P>
where
    P: Probe + Send + Sync + 'static,
{
    pub fn new(probe: P, deadline: Duration, backoff: BackoffPolicy) -> Self {
        Self {
            probe: Arc::new(probe),
            deadline,
            backoff,
        }
    }

    /// Gate with deadline and backoff taken from configuration
    pub fn from_config(probe: P, config: &ReadinessConfig) -> Self {
        Self::new(probe, config.deadline(), config.backoff_policy())
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Wait until every endpoint is ready
    ///
    /// # Errors
    /// `ContractError::ReadinessDeadline` listing the endpoints that were
    /// still unreachable when the deadline elapsed.
    #[instrument(
        name = "readiness_wait_all",
        skip(self, endpoints),
        fields(endpoints = endpoints.len(), deadline_ms = self.deadline.as_millis() as u64)
    )]
    pub async fn wait_all(&self, endpoints: &[Endpoint]) -> Result<ReadinessReport, ContractError> {
        let started = Instant::now();
        if endpoints.is_empty() {
            info!("No dependencies configured, ready");
            return Ok(ReadinessReport::default());
        }

        let deadline = started + self.deadline;
        let mut probes = JoinSet::new();
        for endpoint in endpoints {
            probes.spawn(probe_until_ready(
                Arc::clone(&self.probe),
                endpoint.clone(),
                self.backoff.clone(),
                started,
            ));
        }

        let mut ready = Vec::with_capacity(endpoints.len());
        let mut ready_set = HashSet::new();

        while ready.len() < endpoints.len() {
            match timeout_at(deadline, probes.join_next()).await {
                Ok(Some(Ok(report))) => {
                    ready_set.insert(report.endpoint.clone());
                    ready.push(report);
                }
                Ok(Some(Err(e))) => {
                    return Err(ContractError::Other(format!("probe task failed: {e}")));
                }
                Ok(None) => break,
                Err(_) => {
                    probes.abort_all();
                    let pending: Vec<String> = endpoints
                        .iter()
                        .filter(|e| !ready_set.contains(*e))
                        .map(ToString::to_string)
                        .collect();
                    error!(
                        waited_ms = self.deadline.as_millis() as u64,
                        pending = ?pending,
                        "Readiness deadline elapsed"
                    );
                    return Err(ContractError::ReadinessDeadline {
                        waited: self.deadline,
                        pending,
                    });
                }
            }
        }

        let elapsed = started.elapsed();
        info!(
            endpoints = ready.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "All dependencies ready"
        );
        Ok(ReadinessReport {
            endpoints: ready,
            elapsed,
        })
    }
}

/// Probe one endpoint until it answers
///
/// Runs unbounded; the gate's deadline cancels it.
async fn probe_until_ready<P: Probe>(
    probe: Arc<P>,
    endpoint: Endpoint,
    backoff: BackoffPolicy,
    started: Instant,
) -> EndpointReport {
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        let result = match timeout(endpoint.timeout(), probe.probe(&endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(ContractError::connectivity(
                endpoint.to_string(),
                format!("probe timed out after {:?}", endpoint.timeout()),
            )),
        };

        let label = endpoint.to_string();
        match result {
            Ok(()) => {
                let elapsed = started.elapsed();
                observability::record_readiness_probe(&label, true);
                info!(
                    endpoint = %label,
                    attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Endpoint ready"
                );
                return EndpointReport {
                    endpoint,
                    attempts: attempt,
                    elapsed,
                };
            }
            Err(e) => {
                let delay = backoff.delay_for(attempt);
                observability::record_readiness_probe(&label, false);
                warn!(
                    endpoint = %label,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Endpoint not ready"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails a scripted number of times per endpoint, then succeeds.
    /// Endpoints without a script never succeed.
    #[derive(Default)]
    struct ScriptedProbe {
        failures_before_ready: Mutex<HashMap<String, u32>>,
        calls: AtomicU32,
    }

    impl ScriptedProbe {
        fn ready_after(self, endpoint: &str, failures: u32) -> Self {
            self.failures_before_ready
                .lock()
                .unwrap()
                .insert(endpoint.to_string(), failures);
            self
        }
    }

    impl Probe for ScriptedProbe {
        async fn probe(&self, endpoint: &Endpoint) -> Result<(), ContractError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mut script = self.failures_before_ready.lock().unwrap();
            match script.get_mut(&endpoint.to_string()) {
                Some(0) => Ok(()),
                Some(remaining) => {
                    *remaining -= 1;
                    Err(ContractError::connectivity(endpoint.to_string(), "refused"))
                }
                None => Err(ContractError::connectivity(endpoint.to_string(), "refused")),
            }
        }
    }

    /// Never answers; only the per-probe timeout ends an attempt
    struct HangingProbe;

    impl Probe for HangingProbe {
        async fn probe(&self, _endpoint: &Endpoint) -> Result<(), ContractError> {
            std::future::pending().await
        }
    }

    fn endpoint(addr: &str) -> Endpoint {
        Endpoint::parse(addr, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_three_failures() {
        let probe = ScriptedProbe::default().ready_after("db:5432", 3);
        let gate = ReadinessGate::new(
            probe,
            Duration::from_secs(10),
            BackoffPolicy::fixed(Duration::from_secs(1)),
        );

        let report = gate.wait_all(&[endpoint("db:5432")]).await.unwrap();

        assert_eq!(report.endpoints.len(), 1);
        assert_eq!(report.endpoints[0].attempts, 4);
        assert!(report.elapsed >= Duration::from_secs(3));
        assert!(report.elapsed < Duration::from_millis(3100), "{:?}", report.elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_lists_pending_endpoints() {
        let probe = ScriptedProbe::default().ready_after("db:5432", 0);
        let gate = ReadinessGate::new(
            probe,
            Duration::from_secs(5),
            BackoffPolicy::fixed(Duration::from_secs(1)),
        );

        let started = Instant::now();
        let err = gate
            .wait_all(&[endpoint("db:5432"), endpoint("mq:5672")])
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(5), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "{elapsed:?}");
        match err {
            ContractError::ReadinessDeadline { waited, pending } => {
                assert_eq!(waited, Duration::from_secs(5));
                assert_eq!(pending, vec!["mq:5672".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoints_probed_in_parallel() {
        let probe = ScriptedProbe::default()
            .ready_after("a:1", 2)
            .ready_after("b:2", 2)
            .ready_after("c:3", 2);
        let gate = ReadinessGate::new(
            probe,
            Duration::from_secs(10),
            BackoffPolicy::fixed(Duration::from_secs(1)),
        );

        let report = gate
            .wait_all(&[endpoint("a:1"), endpoint("b:2"), endpoint("c:3")])
            .await
            .unwrap();

        // Sequential probing would take 6s
        assert!(report.elapsed < Duration::from_millis(2100), "{:?}", report.elapsed);
        assert_eq!(report.total_attempts(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_between_probes() {
        let probe = ScriptedProbe::default().ready_after("db:5432", 3);
        let gate = ReadinessGate::new(
            probe,
            Duration::from_secs(30),
            BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(10)),
        );

        let report = gate.wait_all(&[endpoint("db:5432")]).await.unwrap();
        // 1 + 2 + 4
        assert!(report.elapsed >= Duration::from_secs(7));
        assert!(report.elapsed < Duration::from_millis(7100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_counts_as_failure() {
        let gate = ReadinessGate::new(
            HangingProbe,
            Duration::from_secs(5),
            BackoffPolicy::fixed(Duration::from_millis(500)),
        );

        let err = gate.wait_all(&[endpoint("db:5432")]).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_endpoint_set_is_ready() {
        let gate = ReadinessGate::new(
            ScriptedProbe::default(),
            Duration::from_secs(1),
            BackoffPolicy::default(),
        );
        let report = gate.wait_all(&[]).await.unwrap();
        assert!(report.endpoints.is_empty());
        assert_eq!(gate.probe.calls.load(Ordering::Relaxed), 0);
    }
}
