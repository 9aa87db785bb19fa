//! `info` command implementation.

use anyhow::Context;
use config_loader::ConfigLoader;
use contracts::NotifierBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::{CliError, Result};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    readiness: ReadinessInfo,
    source: SourceInfo,
    dispatcher: DispatcherInfo,
    sinks: Vec<SinkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dead_letter_path: Option<String>,
    rules: bool,
}

#[derive(Serialize)]
struct ReadinessInfo {
    deadline_secs: u64,
    retry_interval_ms: u64,
    backoff: String,
    endpoints: Vec<String>,
}

#[derive(Serialize)]
struct SourceInfo {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Serialize)]
struct DispatcherInfo {
    workers: usize,
    max_attempts: u32,
    backoff: String,
    retry_base_delay_ms: u64,
    retry_max_delay_ms: u64,
    delivery_timeout_ms: u64,
    drain_grace_secs: u64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = ?args.config, "Loading configuration info");

    let blueprint = ConfigLoader::load(args.config.as_deref()).map_err(CliError::from_contract)?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

/// Where a sink sends to, from its params
fn sink_target(sink: &contracts::SinkConfig) -> Option<String> {
    ["url", "addr", "path"]
        .iter()
        .find_map(|key| sink.params.get(*key).cloned())
}

fn build_config_info(blueprint: &NotifierBlueprint) -> ConfigInfo {
    let readiness = &blueprint.readiness;
    let dispatch = &blueprint.dispatcher;
    let source = &blueprint.source;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        readiness: ReadinessInfo {
            deadline_secs: readiness.deadline_secs,
            retry_interval_ms: readiness.retry_interval_ms,
            backoff: format!("{:?}", readiness.backoff),
            endpoints: readiness
                .endpoints()
                .iter()
                .map(ToString::to_string)
                .collect(),
        },
        source: SourceInfo {
            kind: format!("{:?}", source.kind),
            location: source
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .or_else(|| source.addr.clone()),
        },
        dispatcher: DispatcherInfo {
            workers: dispatch.workers,
            max_attempts: dispatch.max_attempts,
            backoff: format!("{:?}", dispatch.backoff),
            retry_base_delay_ms: dispatch.retry_base_delay_ms,
            retry_max_delay_ms: dispatch.retry_max_delay_ms,
            delivery_timeout_ms: dispatch.delivery_timeout_ms,
            drain_grace_secs: dispatch.drain_grace_secs,
        },
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                format: format!("{:?}", s.format),
                target: sink_target(s),
            })
            .collect(),
        dead_letter_path: blueprint
            .dead_letter
            .path
            .as_ref()
            .map(|p| p.display().to_string()),
        rules: blueprint.rules.is_some(),
    }
}

fn print_config_info(blueprint: &NotifierBlueprint) {
    let info = build_config_info(blueprint);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Events Notifier Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⏳ Readiness");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Deadline: {}s", info.readiness.deadline_secs);
    println!(
        "   ├─ Retry: {} from {}ms",
        info.readiness.backoff, info.readiness.retry_interval_ms
    );
    if info.readiness.endpoints.is_empty() {
        println!("   └─ Endpoints: (none)");
    } else {
        println!("   └─ Endpoints ({})", info.readiness.endpoints.len());
        let last = info.readiness.endpoints.len() - 1;
        for (i, endpoint) in info.readiness.endpoints.iter().enumerate() {
            let prefix = if i == last { "└─" } else { "├─" };
            println!("      {} {}", prefix, endpoint);
        }
    }

    println!("\n📥 Source");
    match &info.source.location {
        Some(location) => println!("   └─ {} ({})", info.source.kind, location),
        None => println!("   └─ {}", info.source.kind),
    }

    let d = &info.dispatcher;
    println!("\n⚙️  Dispatcher");
    println!("   ├─ Workers: {}", d.workers);
    println!("   ├─ Max attempts: {}", d.max_attempts);
    println!(
        "   ├─ Retry: {} {}ms..{}ms",
        d.backoff, d.retry_base_delay_ms, d.retry_max_delay_ms
    );
    println!("   ├─ Delivery timeout: {}ms", d.delivery_timeout_ms);
    println!("   ├─ Drain grace: {}s", d.drain_grace_secs);
    match &info.dead_letter_path {
        Some(path) => println!("   └─ Dead letters: {}", path),
        None => println!("   └─ Dead letters: (memory)"),
    }

    println!("\n📤 Sinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let prefix = if i + 1 == info.sinks.len() { "└─" } else { "├─" };
        match &sink.target {
            Some(target) => println!(
                "   {} {} ({}, {}) -> {}",
                prefix, sink.name, sink.sink_type, sink.format, target
            ),
            None => println!(
                "   {} {} ({}, {})",
                prefix, sink.name, sink.sink_type, sink.format
            ),
        }
    }

    println!("\n📨 Rules: {}", if info.rules { "configured" } else { "none" });
    println!();
}
