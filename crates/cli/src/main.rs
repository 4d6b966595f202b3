//! # Webhook Router CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 路由器运行时编排与控制 API
//! - 优雅关闭处理

mod cli;
mod commands;
mod control;
mod runtime;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_control, run_router, run_validate, ControlAction};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(observability_config(&cli))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Webhook router starting");

    let result = match &cli.command {
        Commands::Run(args) => run_router(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Restart(args) => run_control(args, ControlAction::Restart).await,
        Commands::Reload(args) => run_control(args, ControlAction::Reload).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Map logging flags (and the `run` metrics port) onto the observability setup
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
        Commands::Run(args) if args.metrics_port != 0 => Some(args.metrics_port),
        _ => None,
    };

    ObservabilityConfig {
        log_format: cli.log_format.clone().into(),
        metrics_port,
        default_log_level: default_log_level.to_string(),
        force_log_level: cli.quiet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_forces_warn() {
        let cli = Cli::parse_from(["webhook-router", "-q", "validate"]);
        let config = observability_config(&cli);
        assert_eq!(config.default_log_level, "warn");
        assert!(config.force_log_level);
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_run_metrics_port_and_format() {
        let cli = Cli::parse_from([
            "webhook-router",
            "-vv",
            "--log-format",
            "json",
            "run",
            "--metrics-port",
            "9100",
        ]);
        let config = observability_config(&cli);
        assert_eq!(config.default_log_level, "trace");
        assert!(!config.force_log_level);
        assert_eq!(config.log_format, observability::LogFormat::Json);
        assert_eq!(config.metrics_port, Some(9100));
    }
}
