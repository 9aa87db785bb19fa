//! # Readiness
//!
//! Startup gate: the dispatcher only starts once every dependency
//! (database, broker, ...) accepts TCP connections.
//!
//! - endpoints are probed in parallel, each with its own backoff
//! - one global deadline bounds the whole gate
//! - an empty endpoint set is ready immediately

mod gate;
mod tcp_probe;

pub use gate::{EndpointReport, ReadinessGate, ReadinessReport};
pub use tcp_probe::TcpProbe;

use contracts::{ContractError, ReadinessConfig};
use tracing::instrument;

/// Wait for the configured endpoints with TCP probes
#[instrument(name = "readiness_wait_for_dependencies", skip(config))]
pub async fn wait_for_dependencies(
    config: &ReadinessConfig,
) -> Result<ReadinessReport, ContractError> {
    ReadinessGate::from_config(TcpProbe::new(), config)
        .wait_all(&config.endpoints())
        .await
}
