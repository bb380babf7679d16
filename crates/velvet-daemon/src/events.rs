//! Event bus wiring.
//!
//! One tokio broadcast channel carries every daemon notification to
//! subscribers (the push layer consumes it in-process). Delivery is
//! best-effort: emitting with no subscribers is not an error, and a
//! lagging subscriber drops old events rather than blocking anyone.

use tokio::sync::broadcast;
use velvet_types::event::{Event, EventType};

/// Event bus for broadcasting notifications to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event_type: EventType, timestamp: u64, payload: serde_json::Value) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(Event {
            event_type,
            timestamp,
            payload,
        });
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// The raw sender handed to the sync services.
    pub fn sender(&self) -> broadcast::Sender<Event> {
        self.sender.clone()
    }
}
