//! Pipeline orchestrator - readiness gate, source, dispatcher.

use std::time::Instant;

use contracts::NotifierBlueprint;
use dispatcher::{create_dispatcher, CancellationToken};
use ingestion::ConfiguredSource;
use tracing::{info, warn};

use super::RunStats;
use crate::error::{CliError, Result};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resolved service configuration
    pub blueprint: NotifierBlueprint,

    /// Start without waiting on dependencies
    pub skip_readiness: bool,
}

/// Runs the service from readiness to drained dispatcher
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source closes or `cancel` fires
    ///
    /// Returns `None` when cancelled before the dispatcher started.
    pub async fn run(self, cancel: CancellationToken) -> Result<Option<RunStats>> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Readiness gate
        let readiness = if self.config.skip_readiness {
            warn!("Readiness gate skipped");
            None
        } else {
            info!(
                endpoints = blueprint.readiness.endpoints.len(),
                deadline_secs = blueprint.readiness.deadline_secs,
                "Waiting for dependencies..."
            );
            tokio::select! {
                result = readiness::wait_for_dependencies(&blueprint.readiness) => {
                    Some(result.map_err(CliError::from_contract)?)
                }
                _ = cancel.cancelled() => {
                    warn!("Shutdown requested while waiting for dependencies");
                    return Ok(None);
                }
            }
        };

        // Sinks before the source, so a bad sink never leaves a bound listener behind
        let dispatcher = create_dispatcher(blueprint).await?;
        let source = ConfiguredSource::open(&blueprint.source)
            .await
            .map_err(CliError::Source)?;
        let source_metrics = source.metrics().clone();

        info!(
            source = ?blueprint.source.kind,
            sinks = ?dispatcher.sink_names(),
            "Dispatcher starting"
        );

        let report = dispatcher.run(source, cancel).await?;

        Ok(Some(RunStats {
            readiness,
            report,
            sink_metrics: dispatcher.metrics(),
            decode_errors: source_metrics.snapshot().decode_errors,
            duration: start_time.elapsed(),
        }))
    }
}
