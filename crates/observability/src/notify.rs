//! NotificationSink implementations
//!
//! - `NotificationHub`: lossy broadcast to any number of subscribers
//! - `TracingSink`: forwards to `tracing`
//! - `CollectingSink`: keeps everything in memory (tests, dry runs)

use std::sync::{Arc, Mutex};

use contracts::{Notification, NotificationLevel, NotificationSink};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Broadcast hub for notifications.
///
/// `notify` never blocks: with no subscribers the message is dropped, and a
/// subscriber that falls behind sees `RecvError::Lagged` instead of slowing
/// producers down.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attach a new observer
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationSink for NotificationHub {
    fn notify(&self, notification: Notification) {
        // Err only means nobody is listening
        let _ = self.sender.send(notification);
    }
}

/// Logs every notification at a matching level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Debug => debug!(kind = ?n.kind, "{}", n.message),
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(level = %n.level, "{}", n.message)
            }
            NotificationLevel::Warning => warn!("{}", n.message),
            NotificationLevel::Error => error!("{}", n.message),
        }
    }
}

/// Records notifications in memory
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    items: Arc<Mutex<Vec<Notification>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far
    pub fn snapshot(&self) -> Vec<Notification> {
        self.items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_where(&self, f: impl Fn(&Notification) -> bool) -> usize {
        self.items
            .lock()
            .map(|items| items.iter().filter(|n| f(n)).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut items) = self.items.lock() {
            items.clear();
        }
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut items) = self.items.lock() {
            items.push(notification);
        }
    }
}

/// Fan a notification out to several sinks
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, notification: Notification) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.notify(notification.clone());
            }
            last.notify(notification);
        }
    }
}
