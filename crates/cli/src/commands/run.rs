//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::control;
use crate::runtime::{RouterRuntime, RuntimeConfig};
use listener::{HttpListenerConfig, HttpPushListenerFactory};

/// Execute the `run` command
pub async fn run_router(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let config = RuntimeConfig {
        config_path: args.config.clone(),
        delivery_timeout: Duration::from_secs(args.delivery_timeout.max(1)),
        poll_interval: Duration::from_millis(args.poll_interval_ms.max(10)),
        restart_grace: Duration::from_millis(args.restart_grace_ms),
        shutdown_grace: Duration::from_secs(args.shutdown_grace),
    };
    let factory = HttpPushListenerFactory::new(HttpListenerConfig {
        listen_addr: args.listen_addr,
    });

    let runtime = RouterRuntime::start(config, factory)
        .await
        .context("Failed to start router")?;

    let cancel = CancellationToken::new();
    let served = control::serve(args.control_addr, runtime.control_state(), cancel.clone()).await;
    let (control_addr, control_task) = match served {
        Ok(served) => served,
        Err(e) => {
            // Still drain whatever the listener already accepted
            runtime.shutdown().await;
            return Err(e);
        }
    };

    info!(
        control = %control_addr,
        listen = %args.listen_addr,
        listener = %runtime.supervisor().state(),
        "Router running, press Ctrl+C to stop"
    );

    setup_shutdown_signal().await?;
    warn!("Received shutdown signal, stopping router...");

    cancel.cancel();
    let stats = runtime.shutdown().await;
    if let Err(e) = control_task.await {
        warn!(error = %e, "Control API task ended abnormally");
    }

    info!(
        delivered = stats.deliveries.delivered,
        failures = stats.deliveries.failures(),
        duration_secs = stats.duration.as_secs_f64(),
        "Router stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn setup_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to install Ctrl+C handler")?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;

    Ok(())
}
