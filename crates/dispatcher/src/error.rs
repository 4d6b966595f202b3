//! Delivery error types

use contracts::DeliveryStatus;
use thiserror::Error;

/// Why a single delivery attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Target answered with a non-2xx status
    #[error("HTTP {status}")]
    Rejected { status: u16 },

    /// Connection, DNS, TLS or body error
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Per-attempt timeout elapsed
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

impl DeliveryError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Outcome status recorded for this error
    pub fn status(&self) -> DeliveryStatus {
        match self {
            Self::Rejected { .. } => DeliveryStatus::Rejected,
            Self::Transport { .. } => DeliveryStatus::Failed,
            Self::Timeout { .. } => DeliveryStatus::Timeout,
        }
    }
}
