//! Environment overlay
//!
//! Container deployments configure the notifier through the environment.
//! Variables override (or, without a config file, replace) file settings:
//!
//! | variable                               | effect                                   |
//! |----------------------------------------|------------------------------------------|
//! | `NOTIFIER_DEPENDENCIES`                | `host:port,host:port` replaces endpoints |
//! | `NOTIFIER_PROBE_TIMEOUT_MS`            | per-probe timeout of every endpoint      |
//! | `NOTIFIER_READINESS_TIMEOUT_SECS`      | global readiness deadline                |
//! | `NOTIFIER_READINESS_RETRY_INTERVAL_MS` | delay between probes                     |
//! | `NOTIFIER_MAX_ATTEMPTS`                | delivery attempt ceiling                 |
//! | `NOTIFIER_WORKERS`                     | worker pool size                         |
//! | `NOTIFIER_SINKS`                       | `name=url,...` sinks (see below)         |
//!
//! Sink URLs pick the sink type from their scheme: `http(s)://` webhook,
//! `udp://host:port` network, `file:///path` file, `log` log.

use std::str::FromStr;

use contracts::{
    default_probe_timeout_ms, ContractError, EndpointConfig, NotifierBlueprint, SinkConfig,
    SinkType,
};
use tracing::debug;

pub const DEPENDENCIES: &str = "NOTIFIER_DEPENDENCIES";
pub const PROBE_TIMEOUT_MS: &str = "NOTIFIER_PROBE_TIMEOUT_MS";
pub const READINESS_TIMEOUT_SECS: &str = "NOTIFIER_READINESS_TIMEOUT_SECS";
pub const READINESS_RETRY_INTERVAL_MS: &str = "NOTIFIER_READINESS_RETRY_INTERVAL_MS";
pub const MAX_ATTEMPTS: &str = "NOTIFIER_MAX_ATTEMPTS";
pub const WORKERS: &str = "NOTIFIER_WORKERS";
pub const SINKS: &str = "NOTIFIER_SINKS";

/// Overlay `NOTIFIER_*` variables onto a blueprint
///
/// Returns the names of the variables that were applied.
///
/// # Errors
/// `ConfigParse` when a variable holds a malformed value.
pub fn apply_env_overrides<I, K, V>(
    blueprint: &mut NotifierBlueprint,
    vars: I,
) -> Result<Vec<&'static str>, ContractError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let vars: Vec<(String, String)> = vars
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().trim().to_string()))
        .filter(|(k, _)| k.starts_with("NOTIFIER_"))
        .collect();
    let get = |name: &str| {
        vars.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    };

    let mut applied = Vec::new();

    let probe_timeout = match get(PROBE_TIMEOUT_MS) {
        Some(raw) => {
            applied.push(PROBE_TIMEOUT_MS);
            Some(parse_number::<u64>(PROBE_TIMEOUT_MS, raw)?)
        }
        None => None,
    };

    if let Some(raw) = get(DEPENDENCIES) {
        let timeout_ms = probe_timeout.unwrap_or_else(default_probe_timeout_ms);
        blueprint.readiness.endpoints = parse_dependencies(raw, timeout_ms)?;
        applied.push(DEPENDENCIES);
    } else if let Some(timeout_ms) = probe_timeout {
        for endpoint in &mut blueprint.readiness.endpoints {
            endpoint.timeout_ms = timeout_ms;
        }
    }

    if let Some(raw) = get(READINESS_TIMEOUT_SECS) {
        blueprint.readiness.deadline_secs = parse_number(READINESS_TIMEOUT_SECS, raw)?;
        applied.push(READINESS_TIMEOUT_SECS);
    }

    if let Some(raw) = get(READINESS_RETRY_INTERVAL_MS) {
        blueprint.readiness.retry_interval_ms = parse_number(READINESS_RETRY_INTERVAL_MS, raw)?;
        applied.push(READINESS_RETRY_INTERVAL_MS);
    }

    if let Some(raw) = get(MAX_ATTEMPTS) {
        blueprint.dispatcher.max_attempts = parse_number(MAX_ATTEMPTS, raw)?;
        applied.push(MAX_ATTEMPTS);
    }

    if let Some(raw) = get(WORKERS) {
        blueprint.dispatcher.workers = parse_number(WORKERS, raw)?;
        applied.push(WORKERS);
    }

    if let Some(raw) = get(SINKS) {
        for sink in parse_sinks(raw)? {
            match blueprint.sinks.iter_mut().find(|s| s.name == sink.name) {
                Some(existing) => *existing = sink,
                None => blueprint.sinks.push(sink),
            }
        }
        applied.push(SINKS);
    }

    debug!(applied = ?applied, "Environment overrides applied");
    Ok(applied)
}

/// Parse `host:port,host:port`
pub fn parse_dependencies(raw: &str, timeout_ms: u64) -> Result<Vec<EndpointConfig>, ContractError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|addr| EndpointConfig::parse(addr, timeout_ms))
        .collect()
}

/// Parse `name=url,...` sink declarations
pub fn parse_sinks(raw: &str) -> Result<Vec<SinkConfig>, ContractError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(idx, entry)| parse_sink(idx + 1, entry))
        .collect()
}

fn parse_sink(position: usize, entry: &str) -> Result<SinkConfig, ContractError> {
    let (name, url) = match entry.split_once('=') {
        Some((name, url)) => (Some(name.trim()), url.trim()),
        None => (None, entry),
    };

    let (scheme, rest) = url.split_once("://").unwrap_or((url, ""));
    let (sink_type, key, value) = match scheme.to_ascii_lowercase().as_str() {
        "http" | "https" => (SinkType::Webhook, "url", url),
        "udp" => (SinkType::Network, "addr", rest),
        "file" => (SinkType::File, "path", rest),
        "log" => (SinkType::Log, "", ""),
        other => {
            return Err(ContractError::config_parse(format!(
                "{SINKS}: unsupported sink scheme '{other}' in '{entry}'"
            )))
        }
    };

    if sink_type != SinkType::Log && value.is_empty() {
        return Err(ContractError::config_parse(format!(
            "{SINKS}: missing address in '{entry}'"
        )));
    }

    let name = match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}-{position}", scheme.to_ascii_lowercase()),
    };

    let sink = SinkConfig::new(name, sink_type);
    Ok(if key.is_empty() {
        sink
    } else {
        sink.with_param(key, value)
    })
}

fn parse_number<T>(name: &str, raw: &str) -> Result<T, ContractError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ContractError::config_parse(format!("{name}='{raw}': {e}")))
}
