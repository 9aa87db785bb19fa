//! NotifierBlueprint - Config Loader output
//!
//! Describes the whole service: readiness dependencies, dispatcher tuning,
//! event source, dead-letter destination, sinks and notification rules.
//! Built once at startup and passed down immutably.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::{BackoffPolicy, BackoffStrategy, ContractError, Endpoint};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Dependencies to wait on before starting
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Worker pool and retry settings
    #[serde(default)]
    pub dispatcher: DispatchConfig,

    /// Where events come from
    #[serde(default)]
    pub source: SourceConfig,

    /// Where exhausted deliveries are surfaced
    #[serde(default)]
    pub dead_letter: DeadLetterConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,

    /// Notification rules (required by sinks using the `notification` format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RulesConfig>,
}

// ===== Readiness =====

/// Readiness gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Global deadline for all endpoints (seconds)
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Delay after the first failed probe of an endpoint (milliseconds)
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Upper bound of the delay for exponential backoff (milliseconds)
    #[serde(default = "default_max_retry_interval_ms")]
    pub max_retry_interval_ms: u64,

    /// Delay growth between probes
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Endpoints to probe
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            retry_interval_ms: default_retry_interval_ms(),
            max_retry_interval_ms: default_max_retry_interval_ms(),
            backoff: BackoffStrategy::Fixed,
            endpoints: Vec::new(),
        }
    }
}

impl ReadinessConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Delay schedule between probes of one endpoint
    pub fn backoff_policy(&self) -> BackoffPolicy {
        let initial = Duration::from_millis(self.retry_interval_ms);
        match self.backoff {
            BackoffStrategy::Fixed => BackoffPolicy::fixed(initial),
            BackoffStrategy::Exponential => BackoffPolicy::exponential(
                initial,
                Duration::from_millis(self.max_retry_interval_ms),
            ),
        }
    }

    /// Immutable endpoints built from configuration
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.iter().map(EndpointConfig::to_endpoint).collect()
    }
}

fn default_deadline_secs() -> u64 {
    30
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_max_retry_interval_ms() -> u64 {
    10_000
}

/// One dependency endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,

    /// Per-probe connect timeout (milliseconds)
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl EndpointConfig {
    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.host.clone(),
            self.port,
            Duration::from_millis(self.timeout_ms),
        )
    }

    /// Parse `host:port` with the given probe timeout
    pub fn parse(addr: &str, timeout_ms: u64) -> Result<Self, ContractError> {
        let endpoint = Endpoint::parse(addr, Duration::from_millis(timeout_ms))?;
        Ok(Self {
            host: endpoint.host().to_string(),
            port: endpoint.port(),
            timeout_ms,
        })
    }
}

pub fn default_probe_timeout_ms() -> u64 {
    2000
}

// ===== Dispatcher =====

/// Dispatcher tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Worker pool size (events in flight concurrently)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempt ceiling per (event, sink) pair, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound of the retry delay (milliseconds)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Delay growth between retries
    #[serde(default = "default_retry_backoff")]
    pub backoff: BackoffStrategy,

    /// Per-attempt sink timeout (milliseconds)
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    /// Grace period for draining in-flight work on shutdown (seconds)
    #[serde(default = "default_drain_grace_secs")]
    pub drain_grace_secs: u64,

    /// Number of outcomes kept in memory
    #[serde(default = "default_outcome_history")]
    pub outcome_history: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            backoff: default_retry_backoff(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            drain_grace_secs: default_drain_grace_secs(),
            outcome_history: default_outcome_history(),
        }
    }
}

impl DispatchConfig {
    /// Delay schedule between delivery retries
    pub fn retry_policy(&self) -> BackoffPolicy {
        let initial = Duration::from_millis(self.retry_base_delay_ms);
        match self.backoff {
            BackoffStrategy::Fixed => BackoffPolicy::fixed(initial),
            BackoffStrategy::Exponential => BackoffPolicy::exponential(
                initial,
                Duration::from_millis(self.retry_max_delay_ms),
            ),
        }
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    60_000
}

fn default_retry_backoff() -> BackoffStrategy {
    BackoffStrategy::Exponential
}

fn default_delivery_timeout_ms() -> u64 {
    30_000
}

fn default_drain_grace_secs() -> u64 {
    10
}

fn default_outcome_history() -> usize {
    10_000
}

// ===== Source =====

/// Event source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source type
    #[serde(default)]
    pub kind: SourceKind,

    /// File to read JSON lines from (`file`)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Listen address (`tcp`)
    #[serde(default)]
    pub addr: Option<String>,

    /// Internal buffer between readers and the dispatcher
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Stdin,
            path: None,
            addr: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    1024
}

/// Event source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON lines on standard input
    #[default]
    Stdin,
    /// JSON lines from a file
    File,
    /// JSON lines from TCP clients
    Tcp,
}

// ===== Dead letter =====

/// Dead-letter destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterConfig {
    /// Append dead letters as JSON lines to this file
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Number of dead letters kept in memory
    #[serde(default = "default_dead_letter_capacity")]
    pub capacity: usize,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            path: None,
            capacity: default_dead_letter_capacity(),
        }
    }
}

fn default_dead_letter_capacity() -> usize {
    1000
}

// ===== Sinks =====

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name, unique across sinks
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// What is delivered
    #[serde(default)]
    pub format: PayloadFormat,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            format: PayloadFormat::Raw,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// tracing output
    Log,
    /// JSON lines appended to a file
    File,
    /// UDP datagrams
    Network,
    /// HTTP POST
    Webhook,
}

/// Delivered payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// Event envelope with the original payload
    #[default]
    Raw,
    /// Notifications rendered by the rule engine
    Notification,
}

// ===== Rules =====

/// Notification rule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Sender address of every notification
    pub from_address: String,

    /// Fixed recipients
    pub contact: ContactConfig,

    /// Base of generated links
    pub link: LinkConfig,
}

/// Fixed notification recipients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Receives HMDMC verification requests
    pub hmdmc_verify: String,

    /// Receives catalogue notifications
    pub dev_team: String,
}

/// Link generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_link_protocol")]
    pub protocol: String,

    /// Host of the linked application
    pub root: String,

    pub port: u16,

    /// Path of the reception app (manifest links)
    #[serde(default = "default_reception_path")]
    pub reception_path: String,

    /// Path segment before the work plan id
    #[serde(default = "default_work_order_begin")]
    pub work_order_begin: String,

    /// Path segment after the work plan id
    #[serde(default = "default_work_order_end")]
    pub work_order_end: String,
}

fn default_link_protocol() -> String {
    "http".to_string()
}

fn default_reception_path() -> String {
    "reception".to_string()
}

fn default_work_order_begin() -> String {
    "work-orders/work_plan".to_string()
}

fn default_work_order_end() -> String {
    "products".to_string()
}
