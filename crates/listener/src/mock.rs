//! Mock listener implementation
//!
//! Implements `EventListener` / `ListenerFactory` without any platform.
//! Events are pushed in by the test through `MockListenerFactory::emit`,
//! consistent with how a real listener invokes the callback.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{ContractError, Credentials, EventCallback, EventListener, InboundEvent, ListenerFactory};
use tracing::{debug, trace};

#[derive(Default)]
struct Feed {
    listening: AtomicBool,
    callback: Mutex<Option<EventCallback>>,
}

/// Mock listener
pub struct MockListener {
    name: String,
    feed: Arc<Feed>,
}

impl MockListener {
    fn new(name: String, feed: Arc<Feed>) -> Self {
        Self { name, feed }
    }
}

impl EventListener for MockListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: EventCallback) {
        // Idempotent: if already listening, keep the first callback
        if self.feed.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut slot) = self.feed.callback.lock() {
            *slot = Some(callback);
        }
        debug!(listener = %self.name, "Mock listener attached");
    }

    fn stop(&self) {
        self.feed.listening.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.feed.callback.lock() {
            slot.take();
        }
        debug!(listener = %self.name, "Mock listener stopped");
    }

    fn is_listening(&self) -> bool {
        self.feed.listening.load(Ordering::SeqCst)
    }
}

impl Drop for MockListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct FactoryState {
    failing: AtomicBool,
    connects: AtomicUsize,
    current: Mutex<Option<Arc<Feed>>>,
    last_credentials: Mutex<Option<Credentials>>,
}

/// Factory producing [`MockListener`]s; clones share state
#[derive(Clone, Default)]
pub struct MockListenerFactory {
    state: Arc<FactoryState>,
}

impl MockListenerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful connects so far
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn last_credentials(&self) -> Option<Credentials> {
        self.state
            .last_credentials
            .lock()
            .ok()
            .and_then(|c| c.clone())
    }

    /// Push an event through the most recent listener.
    ///
    /// Returns `false` when no listener is attached (stopped, restarting or
    /// never started).
    pub fn emit(&self, event: InboundEvent) -> bool {
        let feed = match self.state.current.lock() {
            Ok(current) => current.clone(),
            Err(_) => None,
        };
        let Some(feed) = feed else {
            return false;
        };
        if !feed.listening.load(Ordering::SeqCst) {
            return false;
        }

        let callback = feed.callback.lock().ok().and_then(|c| c.clone());
        match callback {
            Some(callback) => {
                trace!(chat_id = %event.conversation_id, "Mock event emitted");
                callback(event);
                true
            }
            None => false,
        }
    }
}

impl ListenerFactory for MockListenerFactory {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn EventListener>, ContractError> {
        if let Ok(mut last) = self.state.last_credentials.lock() {
            *last = Some(credentials.clone());
        }
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(ContractError::listener_init("mock listener rejected credentials"));
        }

        let n = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let feed = Arc::new(Feed::default());
        if let Ok(mut current) = self.state.current.lock() {
            *current = Some(Arc::clone(&feed));
        }
        Ok(Box::new(MockListener::new(format!("mock-{n}"), feed)))
    }
}
