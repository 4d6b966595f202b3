//! DeliveryClient - outbound transport for one delivery attempt

use std::time::Duration;

use contracts::TargetUrl;
use tracing::trace;

use crate::error::DeliveryError;

/// Posts a JSON body to a target.
///
/// Implementations perform exactly one attempt; timeouts are applied by the
/// dispatcher around the call.
#[trait_variant::make(DeliveryClient: Send)]
pub trait LocalDeliveryClient {
    /// Send `body` to `target`. `Ok` means the target answered 2xx.
    async fn post(&self, target: &TargetUrl, body: &serde_json::Value) -> Result<(), DeliveryError>;
}

/// `reqwest`-backed client used in production
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDeliveryClient {
    /// Build a client whose own timeout matches the per-attempt timeout
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("webhook-router/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::transport(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Wrap a preconfigured client; `timeout` is only used for reporting
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl DeliveryClient for HttpDeliveryClient {
    async fn post(&self, target: &TargetUrl, body: &serde_json::Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(target.as_str())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    DeliveryError::transport(e.to_string())
                }
            })?;

        let status = response.status();
        trace!(target = %target, status = status.as_u16(), "Target responded");

        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
