//! Inbound listener abstraction
//!
//! The platform adapter is opaque to the router: it only has to turn platform
//! notifications into `InboundEvent`s and hand them to a callback.
//! Real (HTTP push) and mock listeners implement the same traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{ContractError, ConversationId, Credentials};

/// One event received from the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Sender's conversation id (routing key)
    pub conversation_id: ConversationId,
    /// Original platform payload, forwarded untouched
    pub payload: serde_json::Value,
}

impl InboundEvent {
    pub fn new(conversation_id: impl Into<ConversationId>, payload: serde_json::Value) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            payload,
        }
    }
}

/// Lifecycle state of the inbound listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Restarting,
}

impl ListenerState {
    /// Numeric encoding for gauges
    pub fn as_gauge(self) -> f64 {
        match self {
            Self::Stopped => 0.0,
            Self::Starting => 1.0,
            Self::Running => 2.0,
            Self::Restarting => 3.0,
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
        };
        f.write_str(s)
    }
}

/// Event callback type
///
/// Invoked once per received event. Must return quickly: the listener does not
/// accept the next event until the callback returns.
pub type EventCallback = Arc<dyn Fn(InboundEvent) + Send + Sync>;

/// A constructed, attachable inbound listener
///
/// # Example
///
/// ```ignore
/// let listener = factory.connect(&credentials).await?;
/// listener.listen(Arc::new(|event| dispatch.submit(event)));
/// // ... later
/// listener.stop();
/// ```
pub trait EventListener: Send + Sync {
    /// Listener name (used for logging)
    fn name(&self) -> &str;

    /// Attach the callback and begin accepting events.
    ///
    /// Repeated calls are idempotent.
    fn listen(&self, callback: EventCallback);

    /// Stop accepting new events. Events already handed to the callback are
    /// not affected.
    fn stop(&self);

    /// Check if currently accepting events
    fn is_listening(&self) -> bool;
}

/// Builds listeners from credentials
#[trait_variant::make(ListenerFactory: Send)]
pub trait LocalListenerFactory {
    /// Construct a listener for these credentials.
    ///
    /// # Errors
    /// `ContractError::ListenerInit` when the credentials are malformed or
    /// rejected upstream.
    async fn connect(&self, credentials: &Credentials)
        -> Result<Box<dyn EventListener>, ContractError>;
}
