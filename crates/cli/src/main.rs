//! # Events Notifier CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 依赖就绪等待 (`wait`)
//! - 事件分发服务 (`run`)
//! - 配置验证与查看 (`validate` / `info`)
//!
//! 退出码：0 正常结束，2 配置错误，3 依赖未就绪，1 其他错误。

mod cli;
mod commands;
mod error;
mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use observability::ObservabilityConfig;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_info, run_notifier, run_validate, run_wait};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = observability::init_with_config(observability_config(&cli)) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Events notifier starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_notifier(args).await,
        Commands::Wait(args) => run_wait(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Command failed");
            ExitCode::from(e.exit_code())
        }
    }
}

fn observability_config(cli: &Cli) -> ObservabilityConfig {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let metrics_port = match &cli.command {
        Commands::Run(args) => args.metrics_port,
        _ => None,
    };

    ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port,
        default_log_level: default_log_level.to_string(),
    }
}
