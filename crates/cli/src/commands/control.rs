//! `restart` / `reload` commands: calls into a running router's control API.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::ControlArgs;

/// Which control endpoint to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Restart,
    Reload,
}

impl ControlAction {
    fn path(self) -> &'static str {
        match self {
            Self::Restart => "/restart",
            Self::Reload => "/reload",
        }
    }
}

/// Execute `restart` or `reload` against a running router
pub async fn run_control(args: &ControlArgs, action: ControlAction) -> Result<()> {
    let url = format!("http://{}{}", args.control_addr, action.path());
    info!(url = %url, "Calling control API");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout.max(1)))
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .post(&url)
        .send()
        .await
        .with_context(|| format!("Router not reachable at {}", args.control_addr))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Control API returned a non-JSON body")?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} failed with HTTP {}: {}",
            action.path(),
            status.as_u16(),
            body["message"].as_str().unwrap_or("unknown error")
        )
    }
}
