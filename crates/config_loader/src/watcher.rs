//! ConfigWatcher - polls the config file and reloads on change
//!
//! A change is any difference in modification time or content hash.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use contracts::Credentials;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::source::ConfigSource;

/// Watcher settings
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// How often the file is checked
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    hash: u64,
}

impl Fingerprint {
    async fn of(path: &Path) -> Option<Self> {
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok();
        let content = tokio::fs::read(path).await.ok()?;
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Some(Self {
            modified,
            hash: hasher.finish(),
        })
    }
}

/// Polls the file behind a [`ConfigSource`].
///
/// After every successful reload the new credentials are sent on
/// `credentials_tx`; the receiver decides whether the listener restarts.
pub struct ConfigWatcher {
    source: Arc<ConfigSource>,
    config: WatcherConfig,
    credentials_tx: mpsc::Sender<Credentials>,
}

impl ConfigWatcher {
    pub fn new(
        source: Arc<ConfigSource>,
        config: WatcherConfig,
        credentials_tx: mpsc::Sender<Credentials>,
    ) -> Self {
        Self {
            source,
            config,
            credentials_tx,
        }
    }

    /// Spawn the polling loop; it stops when `cancel` fires.
    ///
    /// The baseline fingerprint is taken before returning, so any edit made
    /// after `spawn` is seen as a change.
    pub async fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        let baseline = Fingerprint::of(self.source.path()).await;
        tokio::spawn(async move { self.run(baseline, cancel).await })
    }

    #[instrument(name = "config_watcher", skip_all, fields(path = %self.source.path().display()))]
    async fn run(self, baseline: Option<Fingerprint>, cancel: CancellationToken) {
        let path = self.source.path().to_path_buf();
        let mut last = baseline;
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_ms = self.config.poll_interval.as_millis() as u64, "Config watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let current = Fingerprint::of(&path).await;
            if current == last {
                continue;
            }
            last = current;

            if current.is_none() {
                warn!("Config file unreadable, keeping current snapshot");
                continue;
            }

            debug!("Config file changed");
            // Failures are logged by the source; wait for the next edit
            if let Ok(outcome) = self.source.reload().await {
                let credentials = self.source.current().credentials.clone();
                if self.credentials_tx.send(credentials).await.is_err() {
                    debug!("Credentials receiver dropped, stopping watcher");
                    break;
                }
                debug!(version = outcome.version, "Reload forwarded");
            }
        }

        info!("Config watcher stopped");
    }
}
