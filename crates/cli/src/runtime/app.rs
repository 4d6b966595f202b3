//! Router runtime - wires config, dispatcher, listener and watcher together.
//!
//! Startup order:
//! 1. ensure the config file exists, load it (fatal on failure)
//! 2. build the notification fan-out (hub + tracing)
//! 3. build the dispatcher and its non-blocking handle
//! 4. spawn the listener supervisor and start it with the loaded credentials
//! 5. spawn the config watcher and forward credential changes to the supervisor

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, ConfigSource, ConfigWatcher, WatcherConfig};
use contracts::{Credentials, ListenerFactory, NotificationSink, SnapshotStore};
use dispatcher::{DispatchHandle, Dispatcher, DispatcherConfig, HttpDeliveryClient};
use listener::{ListenerSupervisor, SupervisorConfig, SupervisorHandle};
use observability::{FanoutSink, NotificationHub, TracingSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RunStats;
use crate::control::ControlState;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub config_path: PathBuf,
    /// Per-target delivery timeout
    pub delivery_timeout: Duration,
    pub poll_interval: Duration,
    pub restart_grace: Duration,
    /// How long shutdown waits for in-flight deliveries
    pub shutdown_grace: Duration,
}

impl RuntimeConfig {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            delivery_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            restart_grace: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// A running router
pub struct RouterRuntime {
    source: Arc<ConfigSource>,
    dispatch: DispatchHandle<HttpDeliveryClient>,
    supervisor: SupervisorHandle,
    hub: NotificationHub,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    started: Instant,
    shutdown_grace: Duration,
}

impl RouterRuntime {
    /// Start every component. Only an unusable config file is fatal here;
    /// listener problems leave the supervisor `Stopped` and are reported.
    pub async fn start<F>(config: RuntimeConfig, factory: F) -> Result<Self>
    where
        F: ListenerFactory + Sync + 'static,
    {
        let started = Instant::now();

        ConfigLoader::ensure_config(&config.config_path)?;

        let snapshots = Arc::new(SnapshotStore::new());
        let source = Arc::new(ConfigSource::new(&config.config_path, Arc::clone(&snapshots))?);
        let outcome = source
            .reload()
            .await
            .with_context(|| format!("Failed to load config from {}", config.config_path.display()))?;
        info!(
            version = outcome.version,
            routes = outcome.route_count,
            "Configuration loaded"
        );

        let hub = NotificationHub::default();
        let sink: Arc<dyn NotificationSink> = Arc::new(FanoutSink::new(vec![
            Arc::new(hub.clone()),
            Arc::new(TracingSink),
        ]));

        let client = HttpDeliveryClient::new(config.delivery_timeout)
            .context("Failed to build delivery client")?;
        let dispatcher = Arc::new(Dispatcher::new(
            client,
            Arc::clone(&sink),
            DispatcherConfig {
                timeout: config.delivery_timeout,
            },
        ));
        let dispatch = DispatchHandle::new(dispatcher, Arc::clone(&snapshots));

        let supervisor = ListenerSupervisor::new(
            factory,
            dispatch.callback(),
            sink,
            SupervisorConfig {
                restart_grace: config.restart_grace,
                ..Default::default()
            },
        );
        let (supervisor, supervisor_task) = supervisor.spawn();
        let state = supervisor
            .start(source.current().credentials.clone())
            .await
            .context("Listener supervisor exited during startup")?;
        info!(state = %state, "Listener supervisor started");

        let cancel = CancellationToken::new();
        let (credentials_tx, credentials_rx) = mpsc::channel(8);
        let watcher = ConfigWatcher::new(
            Arc::clone(&source),
            WatcherConfig {
                poll_interval: config.poll_interval,
            },
            credentials_tx,
        )
        .spawn(cancel.child_token())
        .await;
        let forwarder = tokio::spawn(forward_credentials(
            credentials_rx,
            supervisor.clone(),
            cancel.child_token(),
        ));

        Ok(Self {
            source,
            dispatch,
            supervisor,
            hub,
            cancel,
            tasks: vec![watcher, forwarder, supervisor_task],
            started,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Shared state for the control API
    pub fn control_state(&self) -> ControlState {
        ControlState {
            source: Arc::clone(&self.source),
            supervisor: self.supervisor.clone(),
            dispatch: self.dispatch.clone(),
            hub: self.hub.clone(),
            started: self.started,
        }
    }

    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.supervisor
    }

    /// Stop the listener, drain deliveries, stop background tasks.
    pub async fn shutdown(self) -> RunStats {
        info!("Shutting down router");
        self.cancel.cancel();

        if let Err(e) = self.supervisor.shutdown().await {
            debug!(error = %e, "Supervisor already stopped");
        }

        let drained = self.dispatch.shutdown(self.shutdown_grace).await;

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        let snapshot = self.source.current();
        RunStats {
            duration: self.started.elapsed(),
            deliveries: self.dispatch.dispatcher().metrics(),
            latency: self.dispatch.dispatcher().latency(),
            config_version: snapshot.version,
            route_count: snapshot.routes.len(),
            drained,
        }
    }
}

/// Apply credentials published by the watcher until cancelled
async fn forward_credentials(
    mut rx: mpsc::Receiver<Credentials>,
    supervisor: SupervisorHandle,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            credentials = rx.recv() => {
                let Some(credentials) = credentials else { break };
                match supervisor.reconfigure(credentials).await {
                    Ok(state) => debug!(state = %state, "Credentials applied"),
                    Err(e) => {
                        warn!(error = %e, "Supervisor gone, stop forwarding credentials");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::post, Json, Router};
    use contracts::{InboundEvent, ListenerState};
    use listener::MockListenerFactory;
    use std::sync::Mutex;
    use tempfile::TempDir;

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn target_server() -> (String, Received) {
        async fn hook(State(received): State<Received>, Json(body): Json<serde_json::Value>) {
            received.lock().unwrap().push(body);
        }

        let received: Received = Arc::default();
        let app = Router::new()
            .route("/hook", post(hook))
            .with_state(Arc::clone(&received));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), received)
    }

    fn config(dir: &TempDir, body: &str) -> RuntimeConfig {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, body).unwrap();
        RuntimeConfig {
            poll_interval: Duration::from_millis(20),
            restart_grace: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(2),
            ..RuntimeConfig::new(path)
        }
    }

    #[tokio::test]
    async fn test_event_reaches_target_and_shutdown_drains() {
        let (url, received) = target_server().await;
        let dir = TempDir::new().unwrap();
        let config = config(
            &dir,
            &format!("credentials: {{ instance_id: '1101', token: 'tok' }}\nroutes:\n  '555@x': '{url}'\n"),
        );
        let factory = MockListenerFactory::new();

        let runtime = RouterRuntime::start(config, factory.clone()).await.unwrap();
        assert_eq!(runtime.supervisor().state(), ListenerState::Running);

        assert!(factory.emit(InboundEvent::new("555@x", serde_json::json!({ "text": "hi" }))));
        assert!(factory.emit(InboundEvent::new("999@x", serde_json::json!({}))));

        let stats = runtime.shutdown().await;
        assert!(stats.drained);
        assert_eq!(stats.deliveries.delivered, 1);
        assert_eq!(stats.deliveries.no_route, 1);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["chatId"], "555@x");
        assert_eq!(received[0]["payload"]["text"], "hi");
    }

    #[tokio::test]
    async fn test_missing_config_is_created_and_listener_waits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let factory = MockListenerFactory::new();

        let runtime = RouterRuntime::start(RuntimeConfig::new(&path), factory.clone())
            .await
            .unwrap();
        assert!(path.exists());
        // Placeholder credentials count as unset
        assert_eq!(factory.connect_count(), 0);
        assert_eq!(runtime.supervisor().state(), ListenerState::Stopped);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_unparsable_config_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, "routes: [unclosed");
        assert!(RouterRuntime::start(config, MockListenerFactory::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_credential_edit_restarts_listener() {
        let dir = TempDir::new().unwrap();
        let config = config(
            &dir,
            "credentials: { instance_id: '1101', token: 'tok' }\nroutes: {}\n",
        );
        let path = config.config_path.clone();
        let factory = MockListenerFactory::new();
        let runtime = RouterRuntime::start(config, factory.clone()).await.unwrap();
        let mut states = runtime.supervisor().subscribe();

        std::fs::write(
            &path,
            "credentials: { instance_id: '2202', token: 'tok' }\nroutes: {}\n",
        )
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while factory.connect_count() < 2 || *states.borrow_and_update() != ListenerState::Running {
                states.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert_eq!(
            factory.last_credentials(),
            Some(Credentials::new("2202", "tok"))
        );

        runtime.shutdown().await;
    }
}
