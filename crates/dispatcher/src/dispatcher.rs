//! Dispatcher - resolves routes and fans out one event to every target

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use contracts::{
    ConfigSnapshot, ConversationId, DeliveryOutcome, Notification, NotificationSink, RouteEntry,
    TargetUrl,
};

use observability::StatsSummary;

use crate::client::DeliveryClient;
use crate::error::DeliveryError;
use crate::metrics::{DispatchMetrics, ExecutionCounts, MetricsSnapshot};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// Fan-out engine.
///
/// Stateless apart from counters: every call works against the snapshot it
/// is given, so a reload mid-dispatch never changes the targets of that
/// dispatch.
pub struct Dispatcher<C> {
    client: C,
    sink: Arc<dyn NotificationSink>,
    config: DispatcherConfig,
    metrics: DispatchMetrics,
    counts: ExecutionCounts,
}

impl<C: DeliveryClient + Sync> Dispatcher<C> {
    pub fn new(client: C, sink: Arc<dyn NotificationSink>, config: DispatcherConfig) -> Self {
        Self {
            client,
            sink,
            config,
            metrics: DispatchMetrics::new(),
            counts: ExecutionCounts::new(),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Attempt latency summary in milliseconds
    pub fn latency(&self) -> StatsSummary {
        self.metrics.latency()
    }

    pub fn execution_counts(&self) -> &ExecutionCounts {
        &self.counts
    }

    /// Targets for `conversation_id` in `snapshot`, if any
    pub fn resolve<'a>(conversation_id: &str, snapshot: &'a ConfigSnapshot) -> Option<&'a RouteEntry> {
        snapshot
            .routes
            .get(conversation_id)
            .filter(|entry| !entry.targets().is_empty())
    }

    /// Deliver `payload` to every target of `conversation_id`.
    ///
    /// Returns one outcome per target, in target order. An unrouted id yields
    /// an empty vec and a single `NoRoute` notification.
    #[instrument(
        name = "dispatch",
        skip(self, payload, snapshot),
        fields(chat_id = %conversation_id, version = snapshot.version)
    )]
    pub async fn dispatch(
        &self,
        conversation_id: &ConversationId,
        payload: &serde_json::Value,
        snapshot: &ConfigSnapshot,
    ) -> Vec<DeliveryOutcome> {
        let Some(entry) = Self::resolve(conversation_id, snapshot) else {
            self.metrics.inc_no_route();
            observability::record_no_route();
            info!("No routes for chatId");
            self.sink.notify(Notification::no_route(conversation_id.clone()));
            return Vec::new();
        };

        let targets = entry.targets();
        self.metrics.inc_dispatched();
        self.metrics.add_attempts(targets.len() as u64);
        info!(
            route = entry.display_name(),
            targets = targets.len(),
            "Forwarding to webhook(s)"
        );

        let body = serde_json::json!({
            "chatId": conversation_id.as_str(),
            "payload": payload,
        });

        // join_all never short-circuits: every attempt runs to completion
        let attempts = targets
            .iter()
            .map(|target| self.attempt(conversation_id, target, &body));
        join_all(attempts).await
    }

    async fn attempt(
        &self,
        conversation_id: &ConversationId,
        target: &TargetUrl,
        body: &serde_json::Value,
    ) -> DeliveryOutcome {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.timeout, self.client.post(target, body)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            }),
        };
        let latency = started.elapsed();

        let outcome = match result {
            Ok(()) => {
                debug!(target = %target, latency_ms = latency.as_millis() as u64, "Forwarded");
                DeliveryOutcome::delivered(conversation_id.clone(), target.clone(), latency)
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Error forwarding");
                DeliveryOutcome::failed(
                    conversation_id.clone(),
                    target.clone(),
                    e.status(),
                    e.to_string(),
                    latency,
                )
            }
        };

        let latency_ms = latency.as_secs_f64() * 1000.0;
        self.metrics.record(outcome.status);
        self.metrics.record_latency(latency_ms);
        self.counts.record(&outcome);
        observability::record_delivery(outcome.status, latency_ms);
        self.sink.notify(Notification::delivery(outcome.clone()));

        outcome
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use contracts::{Credentials, DeliveryStatus, RouteEntry, RouteTable};
    use observability::CollectingSink;
    use std::collections::HashMap;
    use tokio::time::sleep;

    /// Scripted behaviour per target
    #[derive(Clone, Copy)]
    pub(crate) enum Behaviour {
        Ok { delay_ms: u64 },
        Reject(u16),
        Refuse,
        Hang,
    }

    /// Mock client for testing
    #[derive(Clone, Default)]
    pub(crate) struct MockClient {
        pub behaviours: HashMap<String, Behaviour>,
        pub received: Arc<std::sync::Mutex<Vec<(String, serde_json::Value)>>>,
    }

    impl MockClient {
        pub fn with(mut self, target: &str, behaviour: Behaviour) -> Self {
            self.behaviours.insert(target.to_string(), behaviour);
            self
        }
    }

    impl DeliveryClient for MockClient {
        async fn post(&self, target: &TargetUrl, body: &serde_json::Value) -> Result<(), DeliveryError> {
            self.received
                .lock()
                .unwrap()
                .push((target.to_string(), body.clone()));
            match self
                .behaviours
                .get(target.as_str())
                .copied()
                .unwrap_or(Behaviour::Ok { delay_ms: 0 })
            {
                Behaviour::Ok { delay_ms } => {
                    sleep(Duration::from_millis(delay_ms)).await;
                    Ok(())
                }
                Behaviour::Reject(status) => Err(DeliveryError::Rejected { status }),
                Behaviour::Refuse => Err(DeliveryError::transport("connection refused")),
                Behaviour::Hang => {
                    sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    pub(crate) fn snapshot(routes: &[(&str, &[&str])]) -> ConfigSnapshot {
        let routes: RouteTable = routes
            .iter()
            .map(|(id, targets)| {
                (
                    ConversationId::from(*id),
                    RouteEntry::new(*id, targets.iter().copied()).unwrap(),
                )
            })
            .collect();
        ConfigSnapshot {
            version: 1,
            routes,
            credentials: Credentials::default(),
        }
    }

    fn dispatcher(client: MockClient, timeout_ms: u64) -> (Dispatcher<MockClient>, CollectingSink) {
        let sink = CollectingSink::new();
        let dispatcher = Dispatcher::new(
            client,
            Arc::new(sink.clone()),
            DispatcherConfig {
                timeout: Duration::from_millis(timeout_ms),
            },
        );
        (dispatcher, sink)
    }

    #[tokio::test]
    async fn test_unrouted_id_emits_single_no_route() {
        let (dispatcher, sink) = dispatcher(MockClient::default(), 1000);
        let snapshot = snapshot(&[("555@x", &["http://a.test/h1"])]);

        let outcomes = dispatcher
            .dispatch(&ConversationId::from("999@x"), &serde_json::json!({}), &snapshot)
            .await;

        assert!(outcomes.is_empty());
        assert_eq!(sink.len(), 1);
        assert!(sink.snapshot()[0].is_no_route());
        assert_eq!(dispatcher.metrics().no_route, 1);
        assert_eq!(dispatcher.metrics().attempts, 0);
    }

    #[tokio::test]
    async fn test_timeout_does_not_delay_other_targets() {
        let client = MockClient::default()
            .with("http://a.test/slow", Behaviour::Hang)
            .with("http://b.test/fast", Behaviour::Ok { delay_ms: 10 });
        let (dispatcher, sink) = dispatcher(client, 200);
        let snapshot = snapshot(&[("555@x", &["http://a.test/slow", "http://b.test/fast"])]);

        let outcomes = dispatcher
            .dispatch(&ConversationId::from("555@x"), &serde_json::json!({}), &snapshot)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, DeliveryStatus::Timeout);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[1].status, DeliveryStatus::Delivered);
        // B's latency reflects B alone, not A's timeout
        assert!(outcomes[1].latency < Duration::from_millis(150));
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let client = MockClient::default()
            .with("http://a.test/h1", Behaviour::Reject(500))
            .with("http://a.test/h2", Behaviour::Refuse);
        let (dispatcher, _sink) = dispatcher(client, 1000);
        let snapshot = snapshot(&[(
            "555@x",
            &["http://a.test/h1", "http://a.test/h2", "http://a.test/h3"],
        )]);

        let outcomes = dispatcher
            .dispatch(&ConversationId::from("555@x"), &serde_json::json!({}), &snapshot)
            .await;

        let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![
                DeliveryStatus::Rejected,
                DeliveryStatus::Failed,
                DeliveryStatus::Delivered
            ]
        );
        assert_eq!(outcomes[0].error.as_deref(), Some("HTTP 500"));

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.attempts, 3);
        assert_eq!(metrics.delivered, 1);
        assert_eq!(metrics.failures(), 2);
        assert_eq!(dispatcher.latency().count, 3);
        assert_eq!(
            dispatcher
                .execution_counts()
                .get("555@x", "http://a.test/h3"),
            1
        );
    }

    #[tokio::test]
    async fn test_body_wraps_payload_with_chat_id() {
        let client = MockClient::default();
        let received = Arc::clone(&client.received);
        let (dispatcher, _sink) = dispatcher(client, 1000);
        let snapshot = snapshot(&[("555@x", &["http://a.test/h1"])]);

        let payload = serde_json::json!({ "senderData": { "chatId": "555@x" }, "text": "hi" });
        dispatcher
            .dispatch(&ConversationId::from("555@x"), &payload, &snapshot)
            .await;

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].1,
            serde_json::json!({ "chatId": "555@x", "payload": payload })
        );
    }

    #[test]
    fn test_resolve_is_pure_lookup() {
        let snapshot = snapshot(&[("555@x", &["http://a.test/h1", "http://a.test/h2"])]);
        let entry = Dispatcher::<MockClient>::resolve("555@x", &snapshot).unwrap();
        assert_eq!(entry.targets().len(), 2);
        assert!(Dispatcher::<MockClient>::resolve("999@x", &snapshot).is_none());
    }
}
