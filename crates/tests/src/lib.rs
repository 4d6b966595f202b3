//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 -> 快照 -> 监听器 -> 分发 -> webhook 目标的完整链路
//! - 热重载与监听器重启期间的行为
//! - 写入路径校验失败时配置保持不变

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{
        extract::{Path, State},
        http::StatusCode,
        routing::post,
        Json, Router,
    };
    use config_loader::ConfigSource;
    use contracts::{NotificationSink, SnapshotStore};
    use dispatcher::{DispatchHandle, Dispatcher, DispatcherConfig, HttpDeliveryClient};
    use listener::{ListenerSupervisor, MockListenerFactory, SupervisorConfig, SupervisorHandle};
    use observability::{CollectingSink, FanoutSink, NotificationHub};
    use serde_json::Value;
    use tempfile::TempDir;

    pub type Hits = Arc<Mutex<Vec<(String, Value)>>>;

    /// Local webhook targets under `/{name}`.
    ///
    /// `slow` never answers in time, `delay` answers after 200 ms,
    /// `broken` answers 500; every other name answers 200.
    pub async fn targets() -> (String, Hits) {
        async fn hook(
            State(hits): State<Hits>,
            Path(name): Path<String>,
            Json(body): Json<Value>,
        ) -> StatusCode {
            match name.as_str() {
                "slow" => tokio::time::sleep(Duration::from_secs(5)).await,
                "delay" => tokio::time::sleep(Duration::from_millis(200)).await,
                "broken" => return StatusCode::INTERNAL_SERVER_ERROR,
                _ => {}
            }
            hits.lock().unwrap().push((name, body));
            StatusCode::OK
        }

        let hits: Hits = Arc::default();
        let app = Router::new()
            .route("/{name}", post(hook))
            .with_state(Arc::clone(&hits));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    pub fn hits_for(hits: &Hits, name: &str) -> Vec<Value> {
        hits.lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Everything the runtime wires together, with a mock listener
    pub struct Harness {
        pub dir: TempDir,
        pub source: Arc<ConfigSource>,
        pub dispatch: DispatchHandle<HttpDeliveryClient>,
        pub supervisor: SupervisorHandle,
        pub factory: MockListenerFactory,
        pub hub: NotificationHub,
        pub collected: CollectingSink,
    }

    impl Harness {
        pub async fn start(yaml: &str, timeout: Duration) -> Self {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("config.yaml");
            std::fs::write(&path, yaml).unwrap();

            let snapshots = Arc::new(SnapshotStore::new());
            let source = Arc::new(ConfigSource::new(&path, Arc::clone(&snapshots)).unwrap());
            source.reload().await.unwrap();

            let hub = NotificationHub::default();
            let collected = CollectingSink::new();
            let sink: Arc<dyn NotificationSink> = Arc::new(FanoutSink::new(vec![
                Arc::new(hub.clone()),
                Arc::new(collected.clone()),
            ]));

            let dispatcher = Arc::new(Dispatcher::new(
                HttpDeliveryClient::new(timeout).unwrap(),
                Arc::clone(&sink),
                DispatcherConfig { timeout },
            ));
            let dispatch = DispatchHandle::new(dispatcher, snapshots);

            let factory = MockListenerFactory::new();
            let (supervisor, _task) = ListenerSupervisor::new(
                factory.clone(),
                dispatch.callback(),
                sink,
                SupervisorConfig {
                    restart_grace: Duration::from_millis(10),
                    ..Default::default()
                },
            )
            .spawn();
            supervisor
                .start(source.current().credentials.clone())
                .await
                .unwrap();

            Self {
                dir,
                source,
                dispatch,
                supervisor,
                factory,
                hub,
                collected,
            }
        }

        pub fn path(&self) -> std::path::PathBuf {
            self.dir.path().join("config.yaml")
        }

        /// Wait for every in-flight fan-out
        pub async fn drain(&self) {
            assert!(self.dispatch.shutdown(Duration::from_secs(5)).await);
        }
    }

    pub fn credentials_yaml(instance_id: &str) -> String {
        format!("credentials: {{ instance_id: '{instance_id}', token: 'tok' }}\n")
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigWatcher, WatcherConfig};
    use contracts::{
        ContractError, DeliveryStatus, InboundEvent, ListenerState, Notification, NotificationKind,
    };
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::support::{credentials_yaml, hits_for, targets, Harness};

    fn delivery_statuses(h: &Harness) -> HashMap<String, DeliveryStatus> {
        h.collected
            .snapshot()
            .iter()
            .filter_map(Notification::as_delivery)
            .map(|o| (o.target.to_string(), o.status))
            .collect()
    }

    /// Config file -> listener event -> every target receives `{chatId, payload}`
    #[tokio::test]
    async fn test_event_fans_out_to_every_target() {
        let (base, hits) = targets().await;
        let yaml = format!(
            "{}routes:\n  '555@x': ['{base}/a', '{base}/b']\n",
            credentials_yaml("1101")
        );
        let h = Harness::start(&yaml, Duration::from_secs(2)).await;
        assert_eq!(h.supervisor.state(), ListenerState::Running);

        let payload = json!({ "senderData": { "chatId": "555@x" }, "text": "hello" });
        assert!(h.factory.emit(InboundEvent::new("555@x", payload.clone())));
        h.drain().await;

        let expected = json!({ "chatId": "555@x", "payload": payload });
        assert_eq!(hits_for(&hits, "a"), vec![expected.clone()]);
        assert_eq!(hits_for(&hits, "b"), vec![expected]);

        let statuses = delivery_statuses(&h);
        assert_eq!(statuses.len(), 2);
        assert!(statuses.values().all(|s| *s == DeliveryStatus::Delivered));
    }

    /// "999@x" is not routed: zero deliveries, one NoRoute on the hub
    #[tokio::test]
    async fn test_unrouted_event_reports_no_route() {
        let (base, hits) = targets().await;
        let yaml = format!("{}routes:\n  '555@x': '{base}/a'\n", credentials_yaml("1101"));
        let h = Harness::start(&yaml, Duration::from_secs(2)).await;
        let mut rx = h.hub.subscribe();

        assert!(h.factory.emit(InboundEvent::new("999@x", json!({}))));
        h.drain().await;

        let mut no_route = 0;
        let mut deliveries = 0;
        while let Ok(n) = rx.try_recv() {
            match n.kind {
                NotificationKind::NoRoute { ref conversation_id } => {
                    assert_eq!(conversation_id.as_str(), "999@x");
                    no_route += 1;
                }
                NotificationKind::Delivery { .. } => deliveries += 1,
                _ => {}
            }
        }
        assert_eq!(no_route, 1);
        assert_eq!(deliveries, 0);
        assert!(hits.lock().unwrap().is_empty());
    }

    /// Timeout, rejection and success in one fan-out, each reported on its own
    #[tokio::test]
    async fn test_failures_are_isolated_over_http() {
        let (base, hits) = targets().await;
        let yaml = format!(
            "{}routes:\n  '555@x': ['{base}/slow', '{base}/broken', '{base}/a']\n",
            credentials_yaml("1101")
        );
        let h = Harness::start(&yaml, Duration::from_millis(300)).await;

        h.factory.emit(InboundEvent::new("555@x", json!({})));
        h.drain().await;

        let statuses = delivery_statuses(&h);
        assert_eq!(statuses[&format!("{base}/slow")], DeliveryStatus::Timeout);
        assert_eq!(statuses[&format!("{base}/broken")], DeliveryStatus::Rejected);
        assert_eq!(statuses[&format!("{base}/a")], DeliveryStatus::Delivered);
        assert_eq!(hits_for(&hits, "a").len(), 1);

        let counts = h.dispatch.dispatcher().execution_counts().snapshot();
        assert_eq!(counts["555@x"].len(), 1);
    }

    /// A dispatch started before an edit keeps the old targets; the next one
    /// sees the new targets.
    #[tokio::test]
    async fn test_edit_during_dispatch_keeps_snapshot() {
        let (base, hits) = targets().await;
        let yaml = format!("{}routes:\n  '555@x': '{base}/delay'\n", credentials_yaml("1101"));
        let h = Harness::start(&yaml, Duration::from_secs(2)).await;
        let version_before = h.source.current().version;

        h.factory.emit(InboundEvent::new("555@x", json!({ "n": 1 })));
        h.source
            .update_route("555@x", Some("Moved"), &[format!("{base}/b")])
            .await
            .unwrap();
        h.factory.emit(InboundEvent::new("555@x", json!({ "n": 2 })));
        h.drain().await;

        assert!(h.source.current().version > version_before);
        let old = hits_for(&hits, "delay");
        let new = hits_for(&hits, "b");
        assert_eq!(old.len(), 1);
        assert_eq!(old[0]["payload"]["n"], 1);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0]["payload"]["n"], 2);
    }

    /// Duplicate targets via the write path are rejected; file and table unchanged
    #[tokio::test]
    async fn test_duplicate_write_leaves_config_unchanged() {
        let (base, _hits) = targets().await;
        let yaml = format!("{}routes:\n  '555@x': '{base}/a'\n", credentials_yaml("1101"));
        let h = Harness::start(&yaml, Duration::from_secs(2)).await;
        let file_before = std::fs::read_to_string(h.path()).unwrap();
        let snapshot_before = h.source.current();

        let dup = vec![format!("{base}/x"), format!("{base}/x")];
        let err = h.source.update_route("555@x", None, &dup).await.unwrap_err();
        assert!(matches!(err, ContractError::DuplicateTarget { .. }));
        let err = h.source.add_route("777@x", None, &dup).await.unwrap_err();
        assert!(matches!(err, ContractError::DuplicateTarget { .. }));

        assert_eq!(std::fs::read_to_string(h.path()).unwrap(), file_before);
        let snapshot_after = h.source.current();
        assert_eq!(snapshot_after.version, snapshot_before.version);
        assert_eq!(snapshot_after.routes, snapshot_before.routes);
    }

    /// Added route round-trips through the file with its name and targets
    #[tokio::test]
    async fn test_write_path_round_trip() {
        let (base, _hits) = targets().await;
        let yaml = format!("{}routes: {{}}\n", credentials_yaml("1101"));
        let h = Harness::start(&yaml, Duration::from_secs(2)).await;

        let urls = vec![format!("{base}/a"), format!("{base}/b")];
        h.source.add_route("555@x", Some("Sales"), &urls).await.unwrap();

        let reread = config_loader::ConfigLoader::load_from_path(&h.path()).unwrap().0;
        let entry = reread.get("555@x").unwrap();
        assert_eq!(entry.display_name(), "Sales");
        let targets: Vec<&str> = entry.targets().iter().map(|t| t.as_str()).collect();
        assert_eq!(targets, urls.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// A listener restart never cancels deliveries already handed off
    #[tokio::test]
    async fn test_restart_does_not_cancel_in_flight_delivery() {
        let (base, hits) = targets().await;
        let yaml = format!("{}routes:\n  '555@x': '{base}/delay'\n", credentials_yaml("1101"));
        let h = Harness::start(&yaml, Duration::from_secs(2)).await;

        assert!(h.factory.emit(InboundEvent::new("555@x", json!({}))));
        let outcome = h
            .source
            .update_credentials(contracts::Credentials::new("2202", "tok"))
            .await
            .unwrap();
        assert!(outcome.credentials_changed);
        let state = h
            .supervisor
            .reconfigure(h.source.current().credentials.clone())
            .await
            .unwrap();
        assert_eq!(state, ListenerState::Running);
        h.drain().await;

        assert_eq!(hits_for(&hits, "delay").len(), 1);
        assert_eq!(h.factory.connect_count(), 2);
        let states: Vec<ListenerState> = h
            .collected
            .snapshot()
            .into_iter()
            .filter_map(|n| match n.kind {
                NotificationKind::ListenerState { state } => Some(state),
                _ => None,
            })
            .collect();
        assert!(states.contains(&ListenerState::Restarting));
        assert_eq!(states.last(), Some(&ListenerState::Running));
    }

    /// Hand edit picked up by the watcher; the new route receives events
    #[tokio::test]
    async fn test_watcher_hot_reload() {
        let (base, hits) = targets().await;
        let yaml = format!("{}routes:\n  '555@x': '{base}/a'\n", credentials_yaml("1101"));
        let h = Harness::start(&yaml, Duration::from_secs(2)).await;

        let (tx, mut credentials_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let watcher = ConfigWatcher::new(
            Arc::clone(&h.source),
            WatcherConfig {
                poll_interval: Duration::from_millis(20),
            },
            tx,
        )
        .spawn(cancel.clone())
        .await;

        let mut snapshots = h.source.snapshots().subscribe();
        std::fs::write(
            h.path(),
            format!(
                "{}routes:\n  '555@x': '{base}/a'\n  '888@x': '{base}/c'\n",
                credentials_yaml("1101")
            ),
        )
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !snapshots.borrow_and_update().routes.contains("888@x") {
                snapshots.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert!(credentials_rx.recv().await.is_some());

        h.factory.emit(InboundEvent::new("888@x", json!({})));
        h.drain().await;
        assert_eq!(hits_for(&hits, "c").len(), 1);

        cancel.cancel();
        watcher.await.unwrap();
    }
}
