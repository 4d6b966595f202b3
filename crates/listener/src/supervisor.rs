//! ListenerSupervisor - owns the inbound listener lifecycle
//!
//! ```text
//! Stopped --start--> Starting --ready--> Running
//! Running --credentials changed--> Restarting --stopped--> Starting
//! Running --shutdown--> Stopped
//! ```
//!
//! No listener is attached in `Starting` or `Restarting`, so no events are
//! accepted there. Stopping a listener never touches dispatches that were
//! already handed off.

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Credentials, EventCallback, EventListener, ListenerFactory, ListenerState, Notification,
    NotificationSink,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::SupervisorError;

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Pause between stopping the old listener and starting the new one
    pub restart_grace: Duration,
    /// Command queue capacity
    pub command_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_grace: Duration::from_secs(1),
            command_capacity: 16,
        }
    }
}

enum Command {
    Start {
        credentials: Credentials,
        reply: oneshot::Sender<ListenerState>,
    },
    Reconfigure {
        credentials: Credentials,
        reply: oneshot::Sender<ListenerState>,
    },
    Restart {
        reply: oneshot::Sender<ListenerState>,
    },
    Shutdown {
        reply: oneshot::Sender<ListenerState>,
    },
}

/// The state machine. Usually driven through [`SupervisorHandle`] after
/// [`ListenerSupervisor::spawn`]; the async methods can also be called
/// directly.
pub struct ListenerSupervisor<F> {
    factory: F,
    callback: EventCallback,
    sink: Arc<dyn NotificationSink>,
    config: SupervisorConfig,
    state_tx: watch::Sender<ListenerState>,
    listener: Option<Box<dyn EventListener>>,
    /// Credentials of the last start attempt
    credentials: Option<Credentials>,
}

impl<F: ListenerFactory + Sync + 'static> ListenerSupervisor<F> {
    pub fn new(
        factory: F,
        callback: EventCallback,
        sink: Arc<dyn NotificationSink>,
        config: SupervisorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ListenerState::Stopped);
        Self {
            factory,
            callback,
            sink,
            config,
            state_tx,
            listener: None,
            credentials: None,
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state_tx.borrow()
    }

    /// Start a listener for `credentials`.
    ///
    /// Unset credentials leave the supervisor `Stopped` with a
    /// configuration-needed notification. A factory failure also ends in
    /// `Stopped`, reported as listener-init-failed. Neither is an error.
    #[instrument(name = "supervisor_start", skip_all)]
    pub async fn start(&mut self, credentials: Credentials) -> ListenerState {
        self.stop_listener();
        self.credentials = Some(credentials.clone());

        if !credentials.is_configured() {
            info!("No credentials configured, listener stays stopped");
            self.transition(ListenerState::Stopped);
            self.sink.notify(Notification::configuration_needed());
            return self.state();
        }

        self.transition(ListenerState::Starting);
        match self.factory.connect(&credentials).await {
            Ok(listener) => {
                listener.listen(Arc::clone(&self.callback));
                info!(listener = listener.name(), "Listener ready");
                self.listener = Some(listener);
                self.transition(ListenerState::Running);
            }
            Err(e) => {
                error!(error = %e, "Listener init failed");
                self.transition(ListenerState::Stopped);
                self.sink.notify(Notification::listener_init_failed(&e));
            }
        }
        self.state()
    }

    /// Apply possibly-new credentials.
    ///
    /// Identical credentials cause no transition.
    #[instrument(name = "supervisor_reconfigure", skip_all)]
    pub async fn reconfigure(&mut self, credentials: Credentials) -> ListenerState {
        if self.credentials.as_ref() == Some(&credentials) {
            debug!("Credentials unchanged, no restart");
            return self.state();
        }

        if self.listener.is_some() {
            info!("Credentials changed, restarting listener");
            self.restart_with(credentials).await
        } else {
            self.start(credentials).await
        }
    }

    /// Restart with the current credentials, even if unchanged.
    #[instrument(name = "supervisor_restart", skip_all)]
    pub async fn restart(&mut self) -> ListenerState {
        match self.credentials.clone() {
            Some(credentials) if self.listener.is_some() => self.restart_with(credentials).await,
            Some(credentials) => self.start(credentials).await,
            None => {
                warn!("Restart requested before any credentials were applied");
                self.sink.notify(Notification::configuration_needed());
                self.state()
            }
        }
    }

    /// Stop the listener; state becomes `Stopped`.
    pub fn shutdown(&mut self) -> ListenerState {
        self.stop_listener();
        if self.state() != ListenerState::Stopped {
            self.transition(ListenerState::Stopped);
        }
        self.state()
    }

    async fn restart_with(&mut self, credentials: Credentials) -> ListenerState {
        self.transition(ListenerState::Restarting);
        self.stop_listener();
        tokio::time::sleep(self.config.restart_grace).await;
        self.start(credentials).await
    }

    /// Detach and drop the current listener, if any
    fn stop_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop();
            debug!(listener = listener.name(), "Listener stopped");
        }
    }

    fn transition(&self, state: ListenerState) {
        let previous = self.state_tx.send_replace(state);
        info!(from = %previous, to = %state, "Listener state");
        observability::record_listener_state(state);
        self.sink.notify(Notification::listener_state(state));
    }

    /// Move the state machine onto its own task.
    pub fn spawn(self) -> (SupervisorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.command_capacity.max(1));
        let state_rx = self.state_tx.subscribe();
        let worker = tokio::spawn(self.run(rx));
        (SupervisorHandle { tx, state_rx }, worker)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!("Supervisor started");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Start { credentials, reply } => {
                    let state = self.start(credentials).await;
                    let _ = reply.send(state);
                }
                Command::Reconfigure { credentials, reply } => {
                    let state = self.reconfigure(credentials).await;
                    let _ = reply.send(state);
                }
                Command::Restart { reply } => {
                    let state = self.restart().await;
                    let _ = reply.send(state);
                }
                Command::Shutdown { reply } => {
                    let state = self.shutdown();
                    let _ = reply.send(state);
                    break;
                }
            }
        }

        // All handles dropped or shutdown requested
        self.shutdown();
        debug!("Supervisor stopped");
    }
}

/// Cloneable handle to a running supervisor
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ListenerState>,
}

impl SupervisorHandle {
    pub async fn start(&self, credentials: Credentials) -> Result<ListenerState, SupervisorError> {
        self.request(|reply| Command::Start { credentials, reply }).await
    }

    pub async fn reconfigure(&self, credentials: Credentials) -> Result<ListenerState, SupervisorError> {
        self.request(|reply| Command::Reconfigure { credentials, reply })
            .await
    }

    pub async fn restart(&self) -> Result<ListenerState, SupervisorError> {
        self.request(|reply| Command::Restart { reply }).await
    }

    pub async fn shutdown(&self) -> Result<ListenerState, SupervisorError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Last published state
    pub fn state(&self) -> ListenerState {
        *self.state_rx.borrow()
    }

    /// Receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state_rx.clone()
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<ListenerState>) -> Command,
    ) -> Result<ListenerState, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SupervisorError::Closed)?;
        rx.await.map_err(|_| SupervisorError::Closed)
    }
}
