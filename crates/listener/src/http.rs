//! HTTP push listener
//!
//! The platform pushes notifications as `POST /webhook/{instance_id}` with
//! `Authorization: Bearer <token>`. The sender's conversation id is read from
//! `senderData.chatId`; the whole JSON body is forwarded as the payload.
//! Notifications without a sender (status changes, receipts) are acknowledged
//! and ignored.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use contracts::{ContractError, Credentials, EventCallback, EventListener, InboundEvent, ListenerFactory};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Push listener settings
#[derive(Debug, Clone)]
pub struct HttpListenerConfig {
    /// Address the push endpoint binds to
    pub listen_addr: SocketAddr,
}

impl Default for HttpListenerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

struct Shared {
    instance_id: String,
    token: String,
    listening: AtomicBool,
    callback: Mutex<Option<EventCallback>>,
}

impl Shared {
    fn callback(&self) -> Option<EventCallback> {
        if !self.listening.load(Ordering::SeqCst) {
            return None;
        }
        self.callback.lock().ok().and_then(|c| c.clone())
    }
}

/// A bound push endpoint for one set of credentials
pub struct HttpPushListener {
    name: String,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl HttpPushListener {
    /// Bind and start serving. Events are rejected with 503 until `listen`.
    pub async fn bind(addr: SocketAddr, credentials: &Credentials) -> Result<Self, ContractError> {
        validate_credentials(credentials)?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ContractError::listener_init(format!("cannot bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ContractError::listener_init(e.to_string()))?;

        let shared = Arc::new(Shared {
            instance_id: credentials.instance_id.trim().to_string(),
            token: credentials.token.trim().to_string(),
            listening: AtomicBool::new(false),
            callback: Mutex::new(None),
        });

        let router = Router::new()
            .route("/webhook/{instance_id}", post(receive))
            .with_state(Arc::clone(&shared));

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Push listener server error");
            }
        });

        info!(addr = %local_addr, instance_id = %shared.instance_id, "Push listener bound");

        Ok(Self {
            name: format!("http-push:{}", shared.instance_id),
            local_addr,
            shared,
            cancel,
        })
    }

    /// Actual bound address (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl EventListener for HttpPushListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: EventCallback) {
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut slot) = self.shared.callback.lock() {
            *slot = Some(callback);
        }
        debug!(listener = %self.name, "Push listener accepting events");
    }

    fn stop(&self) {
        self.shared.listening.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.shared.callback.lock() {
            slot.take();
        }
        self.cancel.cancel();
        debug!(listener = %self.name, "Push listener stopped");
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }
}

impl Drop for HttpPushListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builds [`HttpPushListener`]s on a fixed address
#[derive(Debug, Clone, Default)]
pub struct HttpPushListenerFactory {
    config: HttpListenerConfig,
}

impl HttpPushListenerFactory {
    pub fn new(config: HttpListenerConfig) -> Self {
        Self { config }
    }
}

impl ListenerFactory for HttpPushListenerFactory {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn EventListener>, ContractError> {
        let listener = HttpPushListener::bind(self.config.listen_addr, credentials).await?;
        Ok(Box::new(listener))
    }
}

/// Instance ids are ASCII alphanumeric; tokens carry no whitespace.
fn validate_credentials(credentials: &Credentials) -> Result<(), ContractError> {
    let instance_id = credentials.instance_id.trim();
    let token = credentials.token.trim();

    if instance_id.is_empty() || token.is_empty() {
        return Err(ContractError::listener_init("credentials are not set"));
    }
    if !instance_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ContractError::listener_init(format!(
            "instance id '{instance_id}' must be ASCII alphanumeric"
        )));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(ContractError::listener_init("token must not contain whitespace"));
    }
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn receive(
    State(shared): State<Arc<Shared>>,
    Path(instance_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    if instance_id != shared.instance_id {
        return StatusCode::NOT_FOUND;
    }
    if bearer_token(&headers) != Some(shared.token.as_str()) {
        warn!(instance_id = %instance_id, "Push rejected: bad token");
        return StatusCode::UNAUTHORIZED;
    }

    let Some(callback) = shared.callback() else {
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    let chat_id = body
        .pointer("/senderData/chatId")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    match chat_id {
        Some(chat_id) => {
            trace!(chat_id = %chat_id, "Push received");
            callback(InboundEvent::new(chat_id, body));
        }
        None => trace!("Push without senderData.chatId ignored"),
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[test]
    fn test_credentials_validation() {
        assert!(validate_credentials(&Credentials::new("1101", "tok")).is_ok());
        assert!(validate_credentials(&Credentials::new("11-01", "tok")).is_err());
        assert!(validate_credentials(&Credentials::new("1101", "to k")).is_err());
        assert!(validate_credentials(&Credentials::default()).is_err());
    }

    #[tokio::test]
    async fn test_bind_failure_is_listener_init() {
        let first = HttpPushListener::bind(loopback(), &Credentials::new("1101", "tok"))
            .await
            .unwrap();
        let err = HttpPushListener::bind(first.local_addr(), &Credentials::new("1101", "tok"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ContractError::ListenerInit { .. }));
    }

    #[tokio::test]
    async fn test_push_flow() {
        let listener = HttpPushListener::bind(loopback(), &Credentials::new("1101", "tok"))
            .await
            .unwrap();
        let url = format!("http://{}/webhook/1101", listener.local_addr());
        let client = reqwest::Client::new();
        let body = serde_json::json!({
            "typeWebhook": "incomingMessageReceived",
            "senderData": { "chatId": "555@x" },
        });

        // Not listening yet
        let status = client.post(&url).bearer_auth("tok").json(&body).send().await.unwrap().status();
        assert_eq!(status, 503);

        let received = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&received);
        listener.listen(Arc::new(move |event: InboundEvent| {
            captured.lock().unwrap().push(event);
        }));

        let status = client.post(&url).bearer_auth("wrong").json(&body).send().await.unwrap().status();
        assert_eq!(status, 401);

        let status = client.post(&url).bearer_auth("tok").json(&body).send().await.unwrap().status();
        assert_eq!(status, 200);

        let ignored = serde_json::json!({ "typeWebhook": "stateInstanceChanged" });
        let status = client.post(&url).bearer_auth("tok").json(&ignored).send().await.unwrap().status();
        assert_eq!(status, 200);

        {
            let received = received.lock().unwrap();
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].conversation_id, "555@x");
            assert_eq!(received[0].payload, body);
        }

        listener.stop();
        assert!(!listener.is_listening());
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Either refused (server gone) or unavailable; never delivered
        if let Ok(response) = reqwest::Client::new()
            .post(&url)
            .bearer_auth("tok")
            .json(&body)
            .send()
            .await
        {
            assert_eq!(response.status(), 503);
        }
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
