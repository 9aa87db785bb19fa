//! Configuration validation
//!
//! Rules:
//! - readiness deadline > 0, endpoints have a host and a non-zero port
//! - workers >= 1, max_attempts >= 1
//! - sink names non-empty and unique
//! - transport params present (file `path`, network `addr`, webhook `url`)
//! - `notification` sinks need a `[rules]` section
//! - source params present (file `path`, tcp `addr`)

use std::collections::HashSet;

use contracts::{
    ContractError, Endpoint, NotifierBlueprint, PayloadFormat, SinkConfig, SinkType, SourceKind,
};

/// Validate a NotifierBlueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &NotifierBlueprint) -> Result<(), ContractError> {
    validate_readiness(blueprint)?;
    validate_dispatcher(blueprint)?;
    validate_source(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_readiness(blueprint: &NotifierBlueprint) -> Result<(), ContractError> {
    let readiness = &blueprint.readiness;

    if readiness.deadline_secs == 0 {
        return Err(ContractError::config_validation(
            "readiness.deadline_secs",
            "deadline must be > 0",
        ));
    }

    for (idx, endpoint) in readiness.endpoints.iter().enumerate() {
        if endpoint.host.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("readiness.endpoints[{idx}].host"),
                "host cannot be empty",
            ));
        }
        if endpoint.port == 0 {
            return Err(ContractError::config_validation(
                format!("readiness.endpoints[{idx}].port"),
                format!("port must be > 0 for '{}'", endpoint.host),
            ));
        }
        if endpoint.timeout_ms == 0 {
            return Err(ContractError::config_validation(
                format!("readiness.endpoints[{idx}].timeout_ms"),
                "probe timeout must be > 0",
            ));
        }
    }
    Ok(())
}

fn validate_dispatcher(blueprint: &NotifierBlueprint) -> Result<(), ContractError> {
    let dispatcher = &blueprint.dispatcher;

    if dispatcher.workers == 0 {
        return Err(ContractError::config_validation(
            "dispatcher.workers",
            "workers must be >= 1",
        ));
    }
    if dispatcher.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "dispatcher.max_attempts",
            "max_attempts must be >= 1",
        ));
    }
    if dispatcher.delivery_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "dispatcher.delivery_timeout_ms",
            "delivery timeout must be > 0",
        ));
    }
    Ok(())
}

fn validate_source(blueprint: &NotifierBlueprint) -> Result<(), ContractError> {
    let source = &blueprint.source;

    match source.kind {
        SourceKind::File if source.path.is_none() => Err(ContractError::config_validation(
            "source.path",
            "file source requires 'path'",
        )),
        SourceKind::Tcp if source.addr.as_deref().is_none_or(str::is_empty) => Err(
            ContractError::config_validation("source.addr", "tcp source requires 'addr'"),
        ),
        _ if source.channel_capacity == 0 => Err(ContractError::config_validation(
            "source.channel_capacity",
            "channel capacity must be > 0",
        )),
        _ => Ok(()),
    }
}

fn validate_sinks(blueprint: &NotifierBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();

    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.format == PayloadFormat::Notification && blueprint.rules.is_none() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].format", sink.name),
                "notification format requires a [rules] section",
            ));
        }
        validate_sink_params(sink)?;
    }
    Ok(())
}

fn validate_sink_params(sink: &SinkConfig) -> Result<(), ContractError> {
    let required = match sink.sink_type {
        SinkType::Log => return Ok(()),
        SinkType::File => "path",
        SinkType::Network => "addr",
        SinkType::Webhook => "url",
    };

    let value = sink
        .params
        .get(required)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            ContractError::config_validation(
                format!("sinks[{}].params.{required}", sink.name),
                format!("{:?} sink requires '{required}'", sink.sink_type).to_lowercase(),
            )
        })?;

    match sink.sink_type {
        SinkType::Network => {
            Endpoint::parse(value, Default::default()).map_err(|e| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    e.to_string(),
                )
            })?;
        }
        SinkType::Webhook if !value.starts_with("http://") && !value.starts_with("https://") => {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.url", sink.name),
                format!("webhook url must be http(s), got '{value}'"),
            ));
        }
        _ => {}
    }
    Ok(())
}
