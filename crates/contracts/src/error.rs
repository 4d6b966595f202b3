//! Layered error definitions
//!
//! Categorized by source: config / write path / listener

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Resource missing, unreadable, unparsable or empty.
    ///
    /// Recoverable: the caller keeps the last-known-good snapshot.
    #[error("config invalid: {message}")]
    ConfigInvalid {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Write Path Errors =====
    /// Target URL failed validation
    #[error("invalid url '{url}' for route '{conversation_id}': {reason}")]
    InvalidUrl {
        conversation_id: String,
        url: String,
        reason: String,
    },

    /// Same target listed twice within one route
    #[error("duplicate target '{url}' for route '{conversation_id}'")]
    DuplicateTarget {
        conversation_id: String,
        url: String,
    },

    /// A route needs at least one target
    #[error("route '{conversation_id}' has no targets")]
    EmptyTargets { conversation_id: String },

    /// Route already exists (add path)
    #[error("route already exists: {conversation_id}")]
    RouteExists { conversation_id: String },

    /// Route not found (update/delete path)
    #[error("route not found: {conversation_id}")]
    RouteNotFound { conversation_id: String },

    /// Target not present in the route (remove-target path)
    #[error("target '{url}' not found for route '{conversation_id}'")]
    TargetNotFound {
        conversation_id: String,
        url: String,
    },

    // ===== Listener Errors =====
    /// Credentials rejected or listener could not be constructed
    #[error("listener init failed: {message}")]
    ListenerInit { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create a config-invalid error without a source
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config-invalid error wrapping the underlying cause
    pub fn config_invalid_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-url error
    pub fn invalid_url(
        conversation_id: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidUrl {
            conversation_id: conversation_id.into(),
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate-target error
    pub fn duplicate_target(conversation_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::DuplicateTarget {
            conversation_id: conversation_id.into(),
            url: url.into(),
        }
    }

    /// Create a listener init error
    pub fn listener_init(message: impl Into<String>) -> Self {
        Self::ListenerInit {
            message: message.into(),
        }
    }

    /// True for errors raised by write-path validation (caller mistakes)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. } | Self::DuplicateTarget { .. } | Self::EmptyTargets { .. }
        )
    }
}
