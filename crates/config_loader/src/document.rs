//! Raw configuration document and route migration
//!
//! Route values arrive in three historical shapes:
//! - a list of URLs
//! - a single URL string
//! - an object `{ name, target_urls }`
//!
//! `migrate` normalizes all of them into `RouteEntry` exactly once; nothing past
//! this module branches on the raw shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use contracts::{ConversationId, Credentials, RouteEntry, RouteTable};

/// On-disk document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Listener credentials (`green_api` accepted for older files)
    #[serde(default, alias = "green_api")]
    pub credentials: Credentials,

    /// conversation id -> raw route value
    #[serde(default)]
    pub routes: BTreeMap<String, RawRoute>,
}

/// A route value as written by hand or by older versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRoute {
    /// `"555@x": "http://a.test/h1"`
    Single(String),
    /// `"555@x": ["http://a.test/h1", "http://a.test/h2"]`
    List(Vec<String>),
    /// `"555@x": { name: "Ops", target_urls: [...] }`
    Named {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        target_urls: Vec<String>,
    },
    /// `"555@x": ~`
    Missing,
}

impl RawRoute {
    /// Canonical form used by the write path
    pub fn named(name: Option<String>, target_urls: Vec<String>) -> Self {
        Self::Named { name, target_urls }
    }

    /// Targets in written order, whatever the shape
    pub fn target_urls(&self) -> Vec<String> {
        match self {
            Self::Single(url) => vec![url.clone()],
            Self::List(urls) => urls.clone(),
            Self::Named { target_urls, .. } => target_urls.clone(),
            Self::Missing => Vec::new(),
        }
    }

    /// Explicit display name, if the object form carries a non-blank one
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named {
                name: Some(name), ..
            } if !name.trim().is_empty() => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Normalize one raw route.
///
/// Returns `None` when no target survives, so the caller drops the entry.
pub fn migrate_route(conversation_id: &str, raw: &RawRoute) -> Option<RouteEntry> {
    let display_name = raw.name().unwrap_or(conversation_id).trim().to_string();
    RouteEntry::new(display_name, raw.target_urls())
}

/// Normalize a whole document into a fresh table + credentials pair
pub fn migrate(document: &RawDocument) -> (RouteTable, Credentials) {
    let table = document
        .routes
        .iter()
        .filter(|(id, _)| !id.trim().is_empty())
        .filter_map(|(id, raw)| {
            migrate_route(id, raw).map(|entry| (ConversationId::from(id.as_str()), entry))
        })
        .collect();

    (table, document.credentials.clone())
}
