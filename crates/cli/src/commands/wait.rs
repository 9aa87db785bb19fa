//! `wait` command implementation.

use config_loader::{env::parse_dependencies, ConfigLoader};
use contracts::{default_probe_timeout_ms, ReadinessConfig};
use tracing::info;

use crate::cli::WaitArgs;
use crate::error::{CliError, Result};

/// Execute the `wait` command
pub async fn run_wait(args: &WaitArgs) -> Result<()> {
    let blueprint = ConfigLoader::load(args.config.as_deref()).map_err(CliError::from_contract)?;
    let readiness = resolve_readiness(blueprint.readiness, args)?;

    info!(
        endpoints = readiness.endpoints.len(),
        deadline_secs = readiness.deadline_secs,
        "Waiting for dependencies"
    );

    let report = readiness::wait_for_dependencies(&readiness)
        .await
        .map_err(CliError::from_contract)?;

    for endpoint in &report.endpoints {
        println!(
            "{} is available after {:.2}s ({} probe(s))",
            endpoint.endpoint,
            endpoint.elapsed.as_secs_f64(),
            endpoint.attempts
        );
    }
    println!("All dependencies ready in {:.2}s", report.elapsed.as_secs_f64());
    Ok(())
}

/// Apply command-line overrides to the configured gate
fn resolve_readiness(mut readiness: ReadinessConfig, args: &WaitArgs) -> Result<ReadinessConfig> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err(CliError::Config(contracts::ContractError::config_validation(
                "--timeout",
                "deadline must be > 0",
            )));
        }
        readiness.deadline_secs = timeout;
    }

    if !args.dependencies.is_empty() {
        let timeout_ms = args.probe_timeout_ms.unwrap_or_else(default_probe_timeout_ms);
        readiness.endpoints = parse_dependencies(&args.dependencies.join(","), timeout_ms)
            .map_err(CliError::from_contract)?;
    } else if let Some(timeout_ms) = args.probe_timeout_ms {
        for endpoint in &mut readiness.endpoints {
            endpoint.timeout_ms = timeout_ms;
        }
    }

    Ok(readiness)
}
