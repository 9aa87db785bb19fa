//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Events Notifier - wait for dependencies, then deliver events to sinks
#[derive(Parser, Debug)]
#[command(
    name = "events-notifier",
    author,
    version,
    about = "Event notification dispatcher with a startup readiness gate",
    long_about = "Waits until every configured dependency accepts TCP connections, then reads \n\
                  events from its source and delivers them to every configured sink, \n\
                  retrying failures and dead-lettering what cannot be delivered."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "NOTIFIER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "NOTIFIER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Wait for dependencies, then dispatch events until shutdown
    Run(RunArgs),

    /// Only wait for dependencies to accept connections
    Wait(WaitArgs),

    /// Validate configuration without running
    Validate(ValidateArgs),

    /// Display the resolved configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); environment alone if omitted
    #[arg(short, long, env = "NOTIFIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Prometheus metrics port (disabled if omitted)
    #[arg(long, env = "NOTIFIER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Start dispatching without waiting for dependencies
    #[arg(long)]
    pub skip_readiness: bool,

    /// Resolve and print the configuration, then exit
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `wait` command
#[derive(Parser, Debug, Clone)]
pub struct WaitArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "NOTIFIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dependency as host:port; replaces the configured endpoints (repeatable)
    #[arg(short, long = "dependency", value_name = "HOST:PORT")]
    pub dependencies: Vec<String>,

    /// Overall deadline in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Per-probe timeout in milliseconds
    #[arg(long)]
    pub probe_timeout_ms: Option<u64>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, env = "NOTIFIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, env = "NOTIFIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_accepts_repeated_dependencies() {
        let cli = Cli::parse_from([
            "events-notifier",
            "wait",
            "-d",
            "db:5432",
            "--dependency",
            "broker:5672",
            "--timeout",
            "30",
        ]);

        match cli.command {
            Commands::Wait(args) => {
                assert_eq!(args.dependencies, vec!["db:5432", "broker:5672"]);
                assert_eq!(args.timeout, Some(30));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["events-notifier", "run", "--dry-run", "-vv", "--log-format", "json"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.command, Commands::Run(ref a) if a.dry_run && a.config.is_none()));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["events-notifier", "-q", "-v", "info"]).is_err());
    }
}
