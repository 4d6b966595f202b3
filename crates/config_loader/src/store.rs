//! RouteStore - validated write path over the config file
//!
//! Every operation re-reads the file, applies one edit, validates the result
//! and writes it back atomically. A rejected edit leaves the file untouched.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use contracts::{ContractError, Credentials, RouteEntry, RouteTable};
use tracing::{debug, info};

use crate::document::{migrate, migrate_route, RawDocument, RawRoute};
use crate::parser::{self, ConfigFormat};
use crate::validator::validate_targets;
use crate::ConfigLoader;

/// File-backed route store
#[derive(Debug)]
pub struct RouteStore {
    path: PathBuf,
    format: ConfigFormat,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl RouteStore {
    /// Open a store for `path`; the format follows the file extension.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ContractError> {
        let path = path.into();
        let format = ConfigLoader::detect_format(&path)?;
        Ok(Self {
            path,
            format,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current routes as a migrated table
    pub fn routes(&self) -> Result<RouteTable, ContractError> {
        let document = ConfigLoader::load_document(&self.path)?;
        Ok(migrate(&document).0)
    }

    /// Current credentials
    pub fn credentials(&self) -> Result<Credentials, ContractError> {
        Ok(ConfigLoader::load_document(&self.path)?.credentials)
    }

    /// Add a new route. Fails with `RouteExists` when the id is taken.
    pub fn add_route(
        &self,
        conversation_id: &str,
        name: Option<&str>,
        urls: &[String],
    ) -> Result<RouteEntry, ContractError> {
        let conversation_id = conversation_id.trim();
        self.edit(|document| {
            if document.routes.contains_key(conversation_id) {
                return Err(ContractError::RouteExists {
                    conversation_id: conversation_id.to_string(),
                });
            }
            let raw = canonical(conversation_id, name, urls)?;
            let entry = entry_for(conversation_id, &raw)?;
            document.routes.insert(conversation_id.to_string(), raw);
            Ok(entry)
        })
    }

    /// Replace the targets of an existing route.
    ///
    /// `name: None` keeps the current display name.
    pub fn update_route(
        &self,
        conversation_id: &str,
        name: Option<&str>,
        urls: &[String],
    ) -> Result<RouteEntry, ContractError> {
        self.edit(|document| {
            let existing = document
                .routes
                .get(conversation_id)
                .ok_or_else(|| not_found(conversation_id))?;
            let name = name
                .filter(|n| !n.trim().is_empty())
                .or_else(|| existing.name())
                .map(str::to_string);

            let raw = canonical(conversation_id, name.as_deref(), urls)?;
            let entry = entry_for(conversation_id, &raw)?;
            document.routes.insert(conversation_id.to_string(), raw);
            Ok(entry)
        })
    }

    /// Delete a whole route
    pub fn delete_route(&self, conversation_id: &str) -> Result<(), ContractError> {
        self.edit(|document| {
            document
                .routes
                .remove(conversation_id)
                .map(|_| ())
                .ok_or_else(|| not_found(conversation_id))
        })
    }

    /// Remove one target from a route.
    ///
    /// Returns the remaining entry, or `None` when the last target was removed
    /// and the route deleted with it.
    pub fn remove_target(
        &self,
        conversation_id: &str,
        url: &str,
    ) -> Result<Option<RouteEntry>, ContractError> {
        self.edit(|document| {
            let existing = document
                .routes
                .get(conversation_id)
                .ok_or_else(|| not_found(conversation_id))?;

            let mut urls = existing.target_urls();
            let before = urls.len();
            urls.retain(|u| u.trim() != url.trim());
            if urls.len() == before {
                return Err(ContractError::TargetNotFound {
                    conversation_id: conversation_id.to_string(),
                    url: url.to_string(),
                });
            }

            if urls.iter().all(|u| u.trim().is_empty()) {
                document.routes.remove(conversation_id);
                return Ok(None);
            }

            let raw = RawRoute::named(existing.name().map(str::to_string), urls);
            let entry = migrate_route(conversation_id, &raw);
            document.routes.insert(conversation_id.to_string(), raw);
            Ok(entry)
        })
    }

    /// Replace the listener credentials
    pub fn update_credentials(&self, credentials: Credentials) -> Result<(), ContractError> {
        self.edit(|document| {
            document.credentials = Credentials::new(
                credentials.instance_id.trim(),
                credentials.token.trim(),
            );
            Ok(())
        })
    }

    /// Read, apply `f`, write. Nothing is written when `f` fails.
    fn edit<T>(
        &self,
        f: impl FnOnce(&mut RawDocument) -> Result<T, ContractError>,
    ) -> Result<T, ContractError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut document = ConfigLoader::load_document(&self.path)?;
        let result = f(&mut document)?;
        self.write_atomic(&document)?;

        debug!(path = %self.path.display(), routes = document.routes.len(), "Config written");
        Ok(result)
    }

    fn write_atomic(&self, document: &RawDocument) -> Result<(), ContractError> {
        let content = parser::serialize(document, self.format)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), "Config file updated");
        Ok(())
    }
}

/// Validate inputs and build the canonical `{ name, target_urls }` form
fn canonical(
    conversation_id: &str,
    name: Option<&str>,
    urls: &[String],
) -> Result<RawRoute, ContractError> {
    // Blank entries stay in the list so validation reports them
    let urls: Vec<String> = urls.iter().map(|u| u.trim().to_string()).collect();
    validate_targets(conversation_id, &urls)?;

    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    Ok(RawRoute::named(name, urls))
}

fn entry_for(conversation_id: &str, raw: &RawRoute) -> Result<RouteEntry, ContractError> {
    migrate_route(conversation_id, raw).ok_or_else(|| ContractError::EmptyTargets {
        conversation_id: conversation_id.to_string(),
    })
}

fn not_found(conversation_id: &str) -> ContractError {
    ContractError::RouteNotFound {
        conversation_id: conversation_id.to_string(),
    }
}
