//! `validate` command implementation.

use anyhow::Context;
use config_loader::ConfigLoader;
use contracts::{ContractError, NotifierBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    endpoint_count: usize,
    sink_count: usize,
    source: String,
    workers: usize,
    max_attempts: u32,
    rules: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = ?args.config, "Validating configuration");

    let (result, failure) = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    match failure {
        None => Ok(()),
        Some(e) => Err(CliError::Config(e)),
    }
}

fn validate_config(args: &ValidateArgs) -> (ValidationResult, Option<ContractError>) {
    let config_path = args.config.as_ref().map(|p| p.display().to_string());

    match ConfigLoader::load(args.config.as_deref()) {
        Ok(blueprint) => (
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: collect_warnings(&blueprint),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    endpoint_count: blueprint.readiness.endpoints.len(),
                    sink_count: blueprint.sinks.len(),
                    source: format!("{:?}", blueprint.source.kind),
                    workers: blueprint.dispatcher.workers,
                    max_attempts: blueprint.dispatcher.max_attempts,
                    rules: blueprint.rules.is_some(),
                }),
            },
            None,
        ),
        Err(e) => (
            ValidationResult {
                valid: false,
                config_path,
                error: Some(e.to_string()),
                warnings: Vec::new(),
                summary: None,
            },
            Some(e),
        ),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &NotifierBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - `run` will refuse to start".to_string());
    } else if blueprint.sinks.iter().all(|s| s.sink_type == SinkType::Log) {
        warnings.push("Only log sinks configured - events are not forwarded anywhere".to_string());
    }

    if blueprint.readiness.endpoints.is_empty() {
        warnings.push("No readiness endpoints - dispatching starts immediately".to_string());
    }

    if blueprint.dispatcher.max_attempts == 1 {
        warnings.push("dispatcher.max_attempts is 1 - failed deliveries are never retried".to_string());
    }

    if blueprint.dead_letter.path.is_none() {
        warnings.push("dead_letter.path not set - dead letters are kept in memory only".to_string());
    }

    if blueprint.rules.is_some()
        && !blueprint
            .sinks
            .iter()
            .any(|s| s.format == contracts::PayloadFormat::Notification)
    {
        warnings.push("[rules] configured but no sink uses the notification format".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    let path = result.config_path.as_deref().unwrap_or("(environment)");
    if result.valid {
        println!("✓ Configuration is valid: {}", path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Endpoints: {}", summary.endpoint_count);
            println!("  Source: {}", summary.source);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Workers: {}", summary.workers);
            println!("  Max attempts: {}", summary.max_attempts);
            println!("  Rules: {}", if summary.rules { "yes" } else { "no" });
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
