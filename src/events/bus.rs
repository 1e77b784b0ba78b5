//! Typed publish/subscribe event bus.
//!
//! One background consumer thread drains a FIFO queue and invokes every
//! handler registered for an event's type, in subscription order. Handler
//! panics are caught and swallowed; the bus stays alive. Publishers block
//! only for the enqueue critical section, never on handler execution.
//!
//! Ordering: events from a single publisher reach any given handler in
//! publish order. Events from different publishers interleave arbitrarily.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread;

use serde_json::json;

use crate::events::DomainEvent;

type Handler = Arc<dyn Fn(&DomainEvent) + Send + Sync + 'static>;

/// Asynchronous domain event bus with a single consumer worker.
///
/// `start` and `stop` are idempotent. Stopping signals shutdown, wakes the
/// worker, lets it drain whatever is already queued, and joins it. A bus
/// dropped while running stops itself. Subscriptions persist for the bus's
/// lifetime; there is no unsubscribe.
pub struct EventBus {
    shared: Arc<BusShared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

#[derive(Default)]
struct BusShared {
    queue: Mutex<VecDeque<DomainEvent>>,
    available: Condvar,
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
    running: AtomicBool,
}

impl EventBus {
    /// Create a stopped bus with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(BusShared::default()),
            worker: Mutex::new(None),
        }
    }

    /// Register a handler for an event type. Handlers for one type run in
    /// subscription order.
    pub fn subscribe<F>(&self, event_type: &str, handler: F)
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .write()
            .unwrap()
            .entry(event_type.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Enqueue an event and wake the consumer. Never waits on handlers.
    ///
    /// Publishing onto a stopped bus still enqueues; the events are
    /// delivered once the bus is started.
    pub fn publish(&self, event: DomainEvent) {
        {
            self.shared.queue.lock().unwrap().push_back(event);
        }
        self.shared.available.notify_one();
    }

    /// Spawn the consumer worker. No-op when already running.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("mnemo-event-bus".to_string())
            .spawn(move || consume(&shared))
            .expect("failed to spawn event bus worker");

        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Signal shutdown, wake the worker, and join it. The worker drains the
    /// remaining queue before exiting; in-flight handlers run to
    /// completion. No-op when already stopped.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.shared.available.notify_all();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Whether the consumer worker is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Bus statistics as a JSON string: `total_handlers` (count of
    /// subscribed event types), `queue_size`, `is_running`.
    #[must_use]
    pub fn statistics(&self) -> String {
        let total_handlers = self.shared.handlers.read().unwrap().len();
        let queue_size = self.shared.queue.lock().unwrap().len();

        json!({
            "total_handlers": total_handlers,
            "queue_size": queue_size,
            "is_running": self.is_running(),
        })
        .to_string()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn consume(shared: &BusShared) {
    let mut queue = shared.queue.lock().unwrap();
    loop {
        while queue.is_empty() && shared.running.load(Ordering::SeqCst) {
            queue = shared.available.wait(queue).unwrap();
        }

        // Empty queue here means shutdown was signalled; drain-then-exit
        // otherwise.
        let Some(event) = queue.pop_front() else {
            break;
        };

        drop(queue);
        dispatch(shared, &event);
        queue = shared.queue.lock().unwrap();
    }
}

fn dispatch(shared: &BusShared, event: &DomainEvent) {
    // Clone the handler list out so subscriptions are not blocked while
    // handlers run.
    let handlers: Vec<Handler> = shared
        .handlers
        .read()
        .unwrap()
        .get(&event.event_type)
        .cloned()
        .unwrap_or_default();

    for handler in handlers {
        if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
            tracing::warn!(
                event_type = %event.event_type,
                event_id = %event.id,
                "event handler panicked; continuing"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, aggregate_id: &str, version: u64) -> DomainEvent {
        DomainEvent::new(aggregate_id, event_type, "{}", version, 0)
    }

    fn capture() -> (Arc<Mutex<Vec<DomainEvent>>>, impl Fn(&DomainEvent)) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |e: &DomainEvent| {
            sink.lock().unwrap().push(e.clone());
        })
    }

    #[test]
    fn test_publish_subscribe_delivery() {
        let bus = EventBus::new();
        let (seen, handler) = capture();
        bus.subscribe("Created", handler);

        bus.start();
        bus.publish(event("Created", "agg", 1));
        bus.stop();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].aggregate_id, "agg");
    }

    #[test]
    fn test_unsubscribed_event_types_skipped() {
        let bus = EventBus::new();
        let (seen, handler) = capture();
        bus.subscribe("Created", handler);

        bus.start();
        bus.publish(event("SomethingElse", "agg", 1));
        bus.stop();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_single_publisher_order_preserved() {
        let bus = EventBus::new();
        let (seen, handler) = capture();
        bus.subscribe("Created", handler);

        bus.start();
        for version in 1..=100 {
            bus.publish(event("Created", "agg", version));
        }
        bus.stop();

        let versions: Vec<u64> = seen.lock().unwrap().iter().map(|e| e.version).collect();
        assert_eq!(versions, (1..=100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_per_publisher_order_across_threads() {
        let bus = Arc::new(EventBus::new());
        let (seen, handler) = capture();
        bus.subscribe("Created", handler);
        bus.start();

        let mut publishers = Vec::new();
        for aggregate in ["a", "b"] {
            let bus = Arc::clone(&bus);
            publishers.push(thread::spawn(move || {
                for version in 1..=50 {
                    bus.publish(event("Created", aggregate, version));
                }
            }));
        }
        for publisher in publishers {
            publisher.join().unwrap();
        }
        bus.stop();

        let seen = seen.lock().unwrap();
        for aggregate in ["a", "b"] {
            let versions: Vec<u64> = seen
                .iter()
                .filter(|e| e.aggregate_id == aggregate)
                .map(|e| e.version)
                .collect();
            assert_eq!(versions, (1..=50).collect::<Vec<u64>>());
        }
    }

    #[test]
    fn test_handler_panic_swallowed() {
        let bus = EventBus::new();
        bus.subscribe("Created", |_event| panic!("handler blew up"));
        let (seen, handler) = capture();
        bus.subscribe("Created", handler);

        bus.start();
        bus.publish(event("Created", "agg", 1));
        bus.publish(event("Created", "agg", 2));
        bus.stop();

        // The panicking handler never stopped the bus or the second handler.
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe("Created", move |_event| {
                order.lock().unwrap().push(tag);
            });
        }

        bus.start();
        bus.publish(event("Created", "agg", 1));
        bus.stop();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_publish_before_start_is_buffered() {
        let bus = EventBus::new();
        let (seen, handler) = capture();
        bus.subscribe("Created", handler);

        bus.publish(event("Created", "agg", 1));
        assert_eq!(seen.lock().unwrap().len(), 0);

        bus.start();
        bus.stop();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_start_stop_idempotent_and_restartable() {
        let bus = EventBus::new();
        let (seen, handler) = capture();
        bus.subscribe("Created", handler);

        bus.start();
        bus.start();
        assert!(bus.is_running());

        bus.stop();
        bus.stop();
        assert!(!bus.is_running());

        bus.start();
        bus.publish(event("Created", "agg", 1));
        bus.stop();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_statistics_counts_event_types_not_subscriptions() {
        let bus = EventBus::new();
        bus.subscribe("Created", |_| {});
        bus.subscribe("Created", |_| {});
        bus.subscribe("Updated", |_| {});

        let stats: serde_json::Value = serde_json::from_str(&bus.statistics()).unwrap();
        assert_eq!(stats["total_handlers"], 2);
        assert_eq!(stats["queue_size"], 0);
        assert_eq!(stats["is_running"], false);
    }

    #[test]
    fn test_statistics_reports_queue_depth_when_stopped() {
        let bus = EventBus::new();
        bus.publish(event("Created", "agg", 1));
        bus.publish(event("Created", "agg", 2));

        let stats: serde_json::Value = serde_json::from_str(&bus.statistics()).unwrap();
        assert_eq!(stats["queue_size"], 2);
    }

    #[test]
    fn test_drop_stops_running_bus() {
        let bus = EventBus::new();
        bus.start();
        drop(bus); // must not hang or leak the worker
    }
}
