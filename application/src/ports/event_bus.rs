//! Event bus port
//!
//! Best-effort pub/sub used for coordination-event fan-out. Nothing in the
//! engine depends on delivery for correctness.

use serde_json::Value;
use std::sync::Arc;

/// Handler invoked with the channel name and payload.
pub type EventHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Handle for one subscription.
///
/// Dropping the handle unsubscribes; [`Subscription::detach`] keeps the
/// subscription alive for the lifetime of the bus.
pub struct Subscription {
    id: u64,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(id: u64, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the subscription now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the subscription without holding the handle.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Message bus port.
pub trait EventBus: Send + Sync {
    /// Publish a payload. Returns how many handlers received it.
    fn publish(&self, channel: &str, payload: Value) -> usize;

    /// Subscribe to channels matching `pattern`.
    fn subscribe(&self, pattern: &str, handler: EventHandler) -> Subscription;

    fn health_check(&self) -> bool;
}

/// Bus that drops everything.
pub struct NoEventBus;

impl EventBus for NoEventBus {
    fn publish(&self, _channel: &str, _payload: Value) -> usize {
        0
    }

    fn subscribe(&self, _pattern: &str, _handler: EventHandler) -> Subscription {
        Subscription::new(0, || {})
    }

    fn health_check(&self) -> bool {
        true
    }
}
