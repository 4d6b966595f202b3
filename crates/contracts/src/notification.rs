//! NotificationSink trait - telemetry output interface
//!
//! The dispatcher and the listener supervisor are the only producers.
//! Implementations must never block and never fail into the caller.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::{ConversationId, DeliveryOutcome, ListenerState};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Structured payload so observers can react without parsing messages
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Event for a conversation with no configured route
    NoRoute { conversation_id: ConversationId },
    /// One delivery attempt finished
    Delivery { outcome: DeliveryOutcome },
    /// Listener lifecycle transition
    ListenerState { state: ListenerState },
    /// No credentials configured; listener idles in `Stopped`
    ConfigurationNeeded,
    /// Listener could not be started with the given credentials
    ListenerInitFailed,
    /// Free-form message
    General,
}

/// A single `{level, message}` push message
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            level,
            message: message.into(),
            kind,
        }
    }

    pub fn no_route(conversation_id: ConversationId) -> Self {
        Self::new(
            NotificationLevel::Info,
            format!("No routes for chatId: {conversation_id}"),
            NotificationKind::NoRoute { conversation_id },
        )
    }

    pub fn delivery(outcome: DeliveryOutcome) -> Self {
        let (level, message) = if outcome.success {
            (
                NotificationLevel::Success,
                format!("Forwarded to {}", outcome.target),
            )
        } else {
            (
                NotificationLevel::Error,
                format!(
                    "Error forwarding to {}: {}",
                    outcome.target,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ),
            )
        };
        Self::new(level, message, NotificationKind::Delivery { outcome })
    }

    pub fn listener_state(state: ListenerState) -> Self {
        Self::new(
            NotificationLevel::Info,
            format!("Listener {state}"),
            NotificationKind::ListenerState { state },
        )
    }

    pub fn configuration_needed() -> Self {
        Self::new(
            NotificationLevel::Warning,
            "Configuration needed: set instance_id and token",
            NotificationKind::ConfigurationNeeded,
        )
    }

    pub fn listener_init_failed(error: impl fmt::Display) -> Self {
        Self::new(
            NotificationLevel::Error,
            format!("Listener failed to start: {error}"),
            NotificationKind::ListenerInitFailed,
        )
    }

    pub fn general(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self::new(level, message, NotificationKind::General)
    }

    pub fn is_no_route(&self) -> bool {
        matches!(self.kind, NotificationKind::NoRoute { .. })
    }

    pub fn as_delivery(&self) -> Option<&DeliveryOutcome> {
        match &self.kind {
            NotificationKind::Delivery { outcome } => Some(outcome),
            _ => None,
        }
    }
}

/// Best-effort, fire-and-forget notification output
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}
