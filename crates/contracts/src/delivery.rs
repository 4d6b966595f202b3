//! DeliveryOutcome - one per delivery attempt

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::{ConversationId, TargetUrl};

/// How a delivery attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Target answered with a 2xx status
    Delivered,
    /// Attempt abandoned after the per-attempt timeout
    Timeout,
    /// Target answered with a non-2xx status
    Rejected,
    /// Transport-level failure (connect, DNS, TLS, ...)
    Failed,
}

/// Observational record of a single attempt; never persisted
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub conversation_id: ConversationId,
    pub target: TargetUrl,
    pub status: DeliveryStatus,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

impl DeliveryOutcome {
    pub fn delivered(conversation_id: ConversationId, target: TargetUrl, latency: Duration) -> Self {
        Self {
            conversation_id,
            target,
            status: DeliveryStatus::Delivered,
            success: true,
            error: None,
            timestamp: Utc::now(),
            latency,
        }
    }

    pub fn failed(
        conversation_id: ConversationId,
        target: TargetUrl,
        status: DeliveryStatus,
        error: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            conversation_id,
            target,
            status,
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
            latency,
        }
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
