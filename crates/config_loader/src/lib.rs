//! # Config Loader
//!
//! Route configuration loading, migration and publishing.
//!
//! Responsibilities:
//! - Parse YAML/JSON/TOML configuration files
//! - Migrate raw route values into `RouteTable`
//! - Validate writes (URL syntax, duplicate targets)
//! - Publish snapshots and watch the file for changes
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let (routes, credentials) = ConfigLoader::load_from_path(Path::new("config/config.yaml")).unwrap();
//! println!("{} routes for instance {}", routes.len(), credentials.instance_id);
//! ```

mod document;
mod parser;
mod source;
mod store;
mod validator;
mod watcher;

pub use document::{migrate, migrate_route, RawDocument, RawRoute};
pub use parser::ConfigFormat;
pub use source::{ConfigSource, ReloadOutcome};
pub use store::RouteStore;
pub use validator::{validate_target_url, validate_targets};
pub use watcher::{ConfigWatcher, WatcherConfig};

use contracts::{ContractError, Credentials, RouteTable};
use std::path::Path;
use tracing::warn;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and migrate configuration from file path
    ///
    /// Automatically detects format from file extension (.yaml / .json / .toml).
    ///
    /// # Errors
    /// `ContractError::ConfigInvalid` when the file is unreadable, empty or
    /// does not parse.
    pub fn load_from_path(path: &Path) -> Result<(RouteTable, Credentials), ContractError> {
        let document = Self::load_document(path)?;
        Ok(Self::apply(&document))
    }

    /// Load configuration from string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<(RouteTable, Credentials), ContractError> {
        let document = parser::parse(content, format)?;
        Ok(Self::apply(&document))
    }

    /// Read the raw document without migrating it
    pub fn load_document(path: &Path) -> Result<RawDocument, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        parser::parse(&content, format)
    }

    /// Build a fresh table from a document.
    ///
    /// Never touches a previously published table.
    pub fn apply(document: &RawDocument) -> (RouteTable, Credentials) {
        migrate(document)
    }

    /// Check every route with the write-path rules
    pub fn validate(document: &RawDocument) -> Result<(), ContractError> {
        validator::validate(document)
    }

    /// Serialize a document in the given format
    pub fn to_string(document: &RawDocument, format: ConfigFormat) -> Result<String, ContractError> {
        parser::serialize(document, format)
    }

    /// Create a default config file when none exists.
    ///
    /// Returns `true` when a file was created.
    pub fn ensure_config(path: &Path) -> Result<bool, ContractError> {
        if path.exists() {
            return Ok(false);
        }

        let format = Self::detect_format(path)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, parser::serialize(&Self::default_document(), format)?)?;

        warn!(
            path = %path.display(),
            "Config file created, update it with your credentials"
        );
        Ok(true)
    }

    /// Placeholder document written by `ensure_config`
    pub fn default_document() -> RawDocument {
        let mut document = RawDocument {
            credentials: Credentials::placeholder(),
            ..Default::default()
        };
        document.routes.insert(
            "1234567890@c.us".to_string(),
            RawRoute::Single("https://n8n.local/webhook/one".to_string()),
        );
        document
    }
}

impl ConfigLoader {
    pub(crate) fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_invalid("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_invalid(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        std::fs::read_to_string(path).map_err(|e| {
            ContractError::config_invalid_with(format!("cannot read {}: {e}", path.display()), e)
        })
    }
}
