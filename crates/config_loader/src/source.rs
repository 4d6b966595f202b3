//! ConfigSource - the single update path for the active snapshot
//!
//! `reload` re-reads the whole file and publishes a fresh snapshot. A failed
//! reload keeps the last-known-good snapshot in place.
//!
//! File I/O runs on the blocking pool; the async side only awaits it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{ConfigSnapshot, ContractError, Credentials, RouteEntry, RouteTable, SnapshotStore};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::store::RouteStore;
use crate::ConfigLoader;

/// Result of a successful reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReloadOutcome {
    /// Version of the snapshot just published
    pub version: u64,
    /// Credentials differ from the previous snapshot
    pub credentials_changed: bool,
    pub route_count: usize,
}

/// Loads the config file and publishes it into a [`SnapshotStore`]
#[derive(Debug)]
pub struct ConfigSource {
    path: PathBuf,
    store: Arc<RouteStore>,
    snapshots: Arc<SnapshotStore>,
    /// One reload at a time so publish order matches read order
    reload_lock: Mutex<()>,
}

impl ConfigSource {
    pub fn new(path: impl Into<PathBuf>, snapshots: Arc<SnapshotStore>) -> Result<Self, ContractError> {
        let path = path.into();
        let store = Arc::new(RouteStore::new(&path)?);
        Ok(Self {
            path,
            store,
            snapshots,
            reload_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /// Latest published snapshot
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.snapshots.current()
    }

    /// Read and migrate the file without publishing
    pub async fn load(&self) -> Result<(RouteTable, Credentials), ContractError> {
        let path = self.path.clone();
        run_blocking(move || ConfigLoader::load_from_path(&path)).await
    }

    /// Credentials as currently stored in the file
    pub async fn credentials(&self) -> Result<Credentials, ContractError> {
        self.with_store(|store| store.credentials()).await
    }

    /// Re-read the file and publish a new snapshot.
    ///
    /// On error the previous snapshot stays active.
    #[instrument(name = "config_reload", skip(self), fields(path = %self.path.display()))]
    pub async fn reload(&self) -> Result<ReloadOutcome, ContractError> {
        let _guard = self.reload_lock.lock().await;

        let (routes, credentials) = match self.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                observability::record_config_reload(false);
                warn!(
                    error = %e,
                    version = self.snapshots.version(),
                    "Config reload failed, keeping last-known-good snapshot"
                );
                return Err(e);
            }
        };

        let previous = self.snapshots.current();
        let credentials_changed = previous.credentials != credentials;
        let snapshot = self.snapshots.publish(routes, credentials);

        observability::record_config_reload(true);
        info!(
            version = snapshot.version,
            routes = snapshot.routes.len(),
            targets = snapshot.routes.target_count(),
            credentials_changed,
            "Config snapshot published"
        );

        Ok(ReloadOutcome {
            version: snapshot.version,
            credentials_changed,
            route_count: snapshot.routes.len(),
        })
    }

    // ===== Write path =====
    //
    // Each edit goes through the store (validated, atomic) and is then
    // published, so the next dispatch sees it.

    pub async fn add_route(
        &self,
        conversation_id: &str,
        name: Option<&str>,
        urls: &[String],
    ) -> Result<RouteEntry, ContractError> {
        let (id, name, urls) = owned_edit(conversation_id, name, urls);
        let entry = self
            .with_store(move |store| store.add_route(&id, name.as_deref(), &urls))
            .await?;
        self.reload().await?;
        Ok(entry)
    }

    pub async fn update_route(
        &self,
        conversation_id: &str,
        name: Option<&str>,
        urls: &[String],
    ) -> Result<RouteEntry, ContractError> {
        let (id, name, urls) = owned_edit(conversation_id, name, urls);
        let entry = self
            .with_store(move |store| store.update_route(&id, name.as_deref(), &urls))
            .await?;
        self.reload().await?;
        Ok(entry)
    }

    pub async fn delete_route(&self, conversation_id: &str) -> Result<(), ContractError> {
        let id = conversation_id.to_string();
        self.with_store(move |store| store.delete_route(&id)).await?;
        self.reload().await?;
        Ok(())
    }

    pub async fn remove_target(
        &self,
        conversation_id: &str,
        url: &str,
    ) -> Result<Option<RouteEntry>, ContractError> {
        let (id, url) = (conversation_id.to_string(), url.to_string());
        let remaining = self
            .with_store(move |store| store.remove_target(&id, &url))
            .await?;
        self.reload().await?;
        Ok(remaining)
    }

    /// Store new credentials and publish them.
    ///
    /// The caller decides whether to restart the listener from
    /// `ReloadOutcome::credentials_changed`.
    pub async fn update_credentials(
        &self,
        credentials: Credentials,
    ) -> Result<ReloadOutcome, ContractError> {
        self.with_store(move |store| store.update_credentials(credentials))
            .await?;
        self.reload().await
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, ContractError>
    where
        T: Send + 'static,
        F: FnOnce(&RouteStore) -> Result<T, ContractError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        run_blocking(move || f(&store)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, ContractError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ContractError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ContractError::Other(format!("config file task failed: {e}")))?
}

fn owned_edit(
    conversation_id: &str,
    name: Option<&str>,
    urls: &[String],
) -> (String, Option<String>, Vec<String>) {
    (
        conversation_id.to_string(),
        name.map(str::to_string),
        urls.to_vec(),
    )
}
