//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Webhook Router - forwards messaging-platform events to per-conversation webhooks
#[derive(Parser, Debug)]
#[command(
    name = "webhook-router",
    author,
    version,
    about = "Per-conversation webhook fan-out router",
    long_about = "Receives events from a single messaging-platform account and forwards each\n\
                  one to every webhook configured for the sender's conversation id.\n\n\
                  Routes and credentials live in one YAML/JSON/TOML file that is\n\
                  hot-reloaded while the router runs."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ROUTER_VERBOSE")]
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
        env = "ROUTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the router
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Ask a running router to restart its listener
    Restart(ControlArgs),

    /// Ask a running router to reload its configuration
    Reload(ControlArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (YAML, JSON or TOML); created if missing
    #[arg(short, long, default_value = "config.yaml", env = "ROUTER_CONFIG")]
    pub config: PathBuf,

    /// Control API address
    #[arg(long, default_value = "127.0.0.1:8000", env = "ROUTER_CONTROL_ADDR")]
    pub control_addr: SocketAddr,

    /// Address the platform push listener binds to
    #[arg(long, default_value = "0.0.0.0:8080", env = "ROUTER_LISTEN_ADDR")]
    pub listen_addr: SocketAddr,

    /// Per-target delivery timeout in seconds
    #[arg(long, default_value = "5", env = "ROUTER_DELIVERY_TIMEOUT")]
    pub delivery_timeout: u64,

    /// Config file poll interval in milliseconds
    #[arg(long, default_value = "1000", env = "ROUTER_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Pause between stopping and starting the listener on restart, in milliseconds
    #[arg(long, default_value = "1000", env = "ROUTER_RESTART_GRACE_MS")]
    pub restart_grace_ms: u64,

    /// How long shutdown waits for in-flight deliveries, in seconds
    #[arg(long, default_value = "10", env = "ROUTER_SHUTDOWN_GRACE")]
    pub shutdown_grace: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "ROUTER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.yaml", env = "ROUTER_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for commands that talk to a running router
#[derive(Parser, Debug)]
pub struct ControlArgs {
    /// Control API address of the running router
    #[arg(long, default_value = "127.0.0.1:8000", env = "ROUTER_CONTROL_ADDR")]
    pub control_addr: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
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
