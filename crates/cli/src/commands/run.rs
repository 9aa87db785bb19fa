//! `run` command implementation.

use config_loader::ConfigLoader;
use contracts::NotifierBlueprint;
use dispatcher::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_notifier(args: &RunArgs) -> Result<()> {
    let blueprint = ConfigLoader::load(args.config.as_deref()).map_err(CliError::from_contract)?;

    info!(
        config = ?args.config,
        endpoints = blueprint.readiness.endpoints.len(),
        sinks = blueprint.sinks.len(),
        source = ?blueprint.source.kind,
        max_attempts = blueprint.dispatcher.max_attempts,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, draining...");
        trigger.cancel();
    });

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        skip_readiness: args.skip_readiness,
    });

    match pipeline.run(cancel).await? {
        Some(stats) => {
            info!(
                events = stats.report.events_received,
                delivered = stats.report.delivered,
                failed = stats.report.failed,
                abandoned = stats.report.abandoned.len(),
                duration_secs = stats.duration.as_secs_f64(),
                "Notifier stopped"
            );
            stats.print_summary();
        }
        None => info!("Notifier stopped before dispatching"),
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &NotifierBlueprint) {
    println!("\n=== Configuration Summary ===\n");

    println!("Readiness (deadline {}s):", blueprint.readiness.deadline_secs);
    if blueprint.readiness.endpoints.is_empty() {
        println!("  (no dependencies)");
    }
    for endpoint in &blueprint.readiness.endpoints {
        println!(
            "  - {}:{} (probe timeout {}ms)",
            endpoint.host, endpoint.port, endpoint.timeout_ms
        );
    }

    println!("\nSource: {:?}", blueprint.source.kind);

    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        println!("  - {} ({:?}, {:?})", sink.name, sink.sink_type, sink.format);
    }

    let dispatch = &blueprint.dispatcher;
    println!("\nDispatcher:");
    println!("  Workers: {}", dispatch.workers);
    println!("  Max attempts: {}", dispatch.max_attempts);
    println!(
        "  Retry: {:?} from {}ms up to {}ms",
        dispatch.backoff, dispatch.retry_base_delay_ms, dispatch.retry_max_delay_ms
    );
    if let Some(path) = &blueprint.dead_letter.path {
        println!("  Dead letters: {}", path.display());
    }

    println!();
}
