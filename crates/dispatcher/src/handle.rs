//! DispatchHandle - non-blocking hand-off from listeners to the dispatcher

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use contracts::{EventCallback, InboundEvent, SnapshotStore};

use crate::client::DeliveryClient;
use crate::dispatcher::Dispatcher;

/// Cloneable handle that runs each event's fan-out in the background
pub struct DispatchHandle<C> {
    dispatcher: Arc<Dispatcher<C>>,
    snapshots: Arc<SnapshotStore>,
    tracker: TaskTracker,
}

impl<C> Clone for DispatchHandle<C> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            snapshots: Arc::clone(&self.snapshots),
            tracker: self.tracker.clone(),
        }
    }
}

impl<C: DeliveryClient + Sync + 'static> DispatchHandle<C> {
    pub fn new(dispatcher: Arc<Dispatcher<C>>, snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            dispatcher,
            snapshots,
            tracker: TaskTracker::new(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<C>> {
        &self.dispatcher
    }

    /// Number of fan-outs still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Hand an event off and return immediately.
    ///
    /// The snapshot is taken here, so the fan-out uses the routes that were
    /// current when the event arrived, even if a reload lands mid-flight.
    /// Returns `false` once shutdown has begun.
    pub fn submit(&self, event: InboundEvent) -> bool {
        if self.tracker.is_closed() {
            warn!(chat_id = %event.conversation_id, "Dispatcher shutting down, event dropped");
            return false;
        }

        let snapshot = self.snapshots.current();
        let dispatcher = Arc::clone(&self.dispatcher);
        self.tracker.spawn(async move {
            dispatcher
                .dispatch(&event.conversation_id, &event.payload, &snapshot)
                .await;
        });
        true
    }

    /// Callback suitable for `EventListener::listen`
    pub fn callback(&self) -> EventCallback {
        let handle = self.clone();
        Arc::new(move |event: InboundEvent| {
            handle.submit(event);
        })
    }

    /// Stop accepting events and wait up to `grace` for in-flight fan-outs.
    ///
    /// Returns `true` if everything finished in time.
    #[instrument(name = "dispatch_handle_shutdown", skip(self))]
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight deliveries");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                debug!("DispatchHandle shutdown complete");
                true
            }
            Err(_) => {
                warn!(
                    pending = self.tracker.len(),
                    "Grace period elapsed with deliveries still running"
                );
                false
            }
        }
    }
}
