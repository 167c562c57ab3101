//! In-process event bus.
//!
//! Channels are dot-separated (`council.session_started`). A pattern
//! segment `*` matches exactly one channel segment. Handlers run
//! synchronously on the publishing thread, in subscription order.

use council_application::{EventBus, EventHandler, Subscription};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::trace;

struct Listener {
    id: u64,
    pattern: String,
    handler: EventHandler,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    /// Registration order
    entries: Vec<Listener>,
}

/// Bus whose subscribers live in the same process.
#[derive(Default, Clone)]
pub struct InProcessEventBus {
    listeners: Arc<Mutex<Listeners>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }
}

fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(|p| p.into_inner())
}

/// Whether `channel` matches `pattern` segment by segment.
pub fn channel_matches(pattern: &str, channel: &str) -> bool {
    let mut pattern_segments = pattern.split('.');
    let mut channel_segments = channel.split('.');
    loop {
        match (pattern_segments.next(), channel_segments.next()) {
            (None, None) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(c)) if p == c => {}
            _ => return false,
        }
    }
}

impl EventBus for InProcessEventBus {
    fn publish(&self, channel: &str, payload: Value) -> usize {
        // Handlers may subscribe or unsubscribe, so run them without the lock
        let handlers: Vec<EventHandler> = lock(&self.listeners)
            .entries
            .iter()
            .filter(|l| channel_matches(&l.pattern, channel))
            .map(|l| l.handler.clone())
            .collect();

        trace!(channel, handlers = handlers.len(), "publish");
        for handler in &handlers {
            handler(channel, &payload);
        }
        handlers.len()
    }

    fn subscribe(&self, pattern: &str, handler: EventHandler) -> Subscription {
        let id = {
            let mut listeners = lock(&self.listeners);
            listeners.next_id += 1;
            let id = listeners.next_id;
            listeners.entries.push(Listener {
                id,
                pattern: pattern.to_string(),
                handler,
            });
            id
        };

        let weak: Weak<Mutex<Listeners>> = Arc::downgrade(&self.listeners);
        Subscription::new(id, move || {
            if let Some(listeners) = weak.upgrade() {
                lock(&listeners).entries.retain(|l| l.id != id);
            }
        })
    }

    fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, EventHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: EventHandler = Arc::new(move |channel: &str, _payload: &Value| {
            sink.lock().unwrap().push(channel.to_string());
        });
        (seen, handler)
    }

    #[test]
    fn test_channel_matches() {
        assert!(channel_matches("council.*", "council.session_started"));
        assert!(channel_matches("council.handoff.*", "council.handoff.notify"));
        assert!(channel_matches("council.step_failed", "council.step_failed"));
        assert!(!channel_matches("council.*", "council.handoff.notify"));
        assert!(!channel_matches("council.*", "council"));
        assert!(!channel_matches("other.*", "council.step_failed"));
    }

    #[test]
    fn test_publish_reaches_matching_handlers_in_order() {
        let bus = InProcessEventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        let _a = bus.subscribe(
            "council.*",
            Arc::new(move |_: &str, _: &Value| first.lock().unwrap().push("first")),
        );
        let second = order.clone();
        let _b = bus.subscribe(
            "council.session_started",
            Arc::new(move |_: &str, _: &Value| second.lock().unwrap().push("second")),
        );

        let delivered = bus.publish("council.session_started", json!({"type": "session_started"}));
        assert_eq!(delivered, 2);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);

        assert_eq!(bus.publish("council.step_failed", json!({})), 1);
        assert_eq!(bus.publish("elsewhere.step_failed", json!({})), 0);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus = InProcessEventBus::new();
        let (seen, handler) = recorder();
        let subscription = bus.subscribe("council.*", handler);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish("council.a", json!({}));
        drop(subscription);
        bus.publish("council.b", json!({}));

        assert_eq!(*seen.lock().unwrap(), vec!["council.a".to_string()]);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_detached_subscription_stays() {
        let bus = InProcessEventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe("*.*", handler).detach();

        bus.publish("council.a", json!({}));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let bus = InProcessEventBus::new();
        let inner_bus = bus.clone();
        let _outer = bus.subscribe(
            "council.*",
            Arc::new(move |_: &str, _: &Value| {
                inner_bus.subscribe("late.*", Arc::new(|_: &str, _: &Value| {})).detach();
            }),
        );

        assert_eq!(bus.publish("council.a", json!({})), 1);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
