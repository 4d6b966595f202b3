//! RouteTable - ConfigSource output
//!
//! Conversation id -> named set of webhook targets. A table is immutable once
//! built; reloads build a new one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::ConversationId;

/// A delivery target (webhook URL as written in the config)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetUrl(String);

impl TargetUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetUrl {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TargetUrl {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Display name plus an ordered, duplicate-free, non-empty target list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    #[serde(rename = "name")]
    display_name: String,
    #[serde(rename = "target_urls")]
    targets: Vec<TargetUrl>,
}

impl RouteEntry {
    /// Build an entry, keeping the first occurrence of each target.
    ///
    /// Blank targets are skipped. Returns `None` when no target remains,
    /// so a zero-target entry can never be constructed.
    pub fn new<I, T>(display_name: impl Into<String>, targets: I) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<TargetUrl>,
    {
        let mut deduped: Vec<TargetUrl> = Vec::new();
        for target in targets {
            let target = target.into();
            let trimmed = target.as_str().trim();
            if trimmed.is_empty() {
                continue;
            }
            let target = TargetUrl::new(trimmed);
            if !deduped.contains(&target) {
                deduped.push(target);
            }
        }

        if deduped.is_empty() {
            return None;
        }

        Some(Self {
            display_name: display_name.into(),
            targets: deduped,
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn targets(&self) -> &[TargetUrl] {
        &self.targets
    }
}

/// Immutable routing table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<ConversationId, RouteEntry>,
}

impl RouteTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a conversation
    pub fn get(&self, conversation_id: &str) -> Option<&RouteEntry> {
        self.routes.get(conversation_id)
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.routes.contains_key(conversation_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Total number of targets across all routes
    pub fn target_count(&self) -> usize {
        self.routes.values().map(|e| e.targets.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConversationId, &RouteEntry)> {
        self.routes.iter()
    }

    /// Entries sorted by conversation id (stable output for listings)
    pub fn sorted(&self) -> Vec<(&ConversationId, &RouteEntry)> {
        let mut entries: Vec<_> = self.routes.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl FromIterator<(ConversationId, RouteEntry)> for RouteTable {
    fn from_iter<I: IntoIterator<Item = (ConversationId, RouteEntry)>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_dedups_preserving_order() {
        let entry = RouteEntry::new("ops", ["http://b.test", "http://a.test", "http://b.test"])
            .unwrap();
        assert_eq!(
            entry.targets(),
            &[TargetUrl::from("http://b.test"), TargetUrl::from("http://a.test")]
        );
    }

    #[test]
    fn test_entry_without_targets_is_none() {
        assert!(RouteEntry::new("x", Vec::<String>::new()).is_none());
        assert!(RouteEntry::new("x", ["  ", ""]).is_none());
    }

    #[test]
    fn test_table_lookup() {
        let table: RouteTable = [(
            ConversationId::from("555@x"),
            RouteEntry::new("555@x", ["http://a.test/h1"]).unwrap(),
        )]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 1);
        assert_eq!(table.target_count(), 1);
        assert!(table.get("555@x").is_some());
        assert!(table.get("999@x").is_none());
    }

    #[test]
    fn test_entry_serializes_in_canonical_form() {
        let entry = RouteEntry::new("Ops", ["https://ops.test/hook"]).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "Ops", "target_urls": ["https://ops.test/hook"] })
        );
    }
}
