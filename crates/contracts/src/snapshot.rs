//! ConfigSnapshot - versioned, copy-on-write view of the active configuration
//!
//! Exactly one update path publishes; any number of readers take the latest
//! `Arc<ConfigSnapshot>` and keep it for the lifetime of their operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::RouteTable;

/// Platform credentials for the inbound listener
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, deserialize_with = "string_or_number")]
    pub instance_id: String,
    #[serde(default)]
    pub token: String,
}

impl Credentials {
    /// Values written into a freshly created config file
    pub const PLACEHOLDER_INSTANCE_ID: &'static str = "your-instance-id";
    pub const PLACEHOLDER_TOKEN: &'static str = "your-token";

    pub fn new(instance_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            token: token.into(),
        }
    }

    /// Placeholder credentials from a freshly created config file
    pub fn placeholder() -> Self {
        Self::new(Self::PLACEHOLDER_INSTANCE_ID, Self::PLACEHOLDER_TOKEN)
    }

    /// Both fields set and neither is still the placeholder.
    /// Unset credentials keep the listener stopped.
    pub fn is_configured(&self) -> bool {
        let instance_id = self.instance_id.trim();
        let token = self.token.trim();
        !instance_id.is_empty()
            && !token.is_empty()
            && instance_id != Self::PLACEHOLDER_INSTANCE_ID
            && token != Self::PLACEHOLDER_TOKEN
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("instance_id", &self.instance_id)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// Instance ids are numeric on most platforms and often written unquoted.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Unsigned(u64),
        Missing,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Unsigned(n) => n.to_string(),
        Raw::Missing => String::new(),
    })
}

/// One published version of routes + credentials
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    /// Strictly increasing; 0 is the empty bootstrap snapshot
    pub version: u64,
    pub routes: RouteTable,
    pub credentials: Credentials,
}

/// Holder of the active snapshot.
///
/// Publishing replaces the whole `Arc`; in-flight readers keep the version they
/// loaded. Subscribers can await changes through [`SnapshotStore::subscribe`].
#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<Arc<ConfigSnapshot>>,
}

impl SnapshotStore {
    /// Create a store holding the empty version-0 snapshot
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(ConfigSnapshot::default()));
        Self { tx }
    }

    /// Latest published snapshot
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.tx.borrow().clone()
    }

    /// Version of the latest published snapshot
    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Publish a new version; returns the snapshot as stored.
    ///
    /// Version assignment and the swap happen under the channel's write lock,
    /// so concurrent publishers still produce strictly increasing versions.
    pub fn publish(&self, routes: RouteTable, credentials: Credentials) -> Arc<ConfigSnapshot> {
        let mut published = None;
        let mut next = Some((routes, credentials));
        self.tx.send_modify(|current| {
            if let Some((routes, credentials)) = next.take() {
                let snapshot = Arc::new(ConfigSnapshot {
                    version: current.version + 1,
                    routes,
                    credentials,
                });
                *current = Arc::clone(&snapshot);
                published = Some(snapshot);
            }
        });
        published.unwrap_or_else(|| self.current())
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigSnapshot>> {
        self.tx.subscribe()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
