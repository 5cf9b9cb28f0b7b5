//! Event bus abstraction for decoupled event emission.
//!
//! Components publish lifecycle notifications without knowing who listens.
//! Emission is fire-and-forget: no bus implementation applies back-pressure
//! to the emitter.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::TopicEvent;

/// Trait for emitting events to subscribers.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// # Arguments
    /// * `topic` - Event name/topic (e.g., "stt:partial_transcript")
    /// * `payload` - JSON payload to emit
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// Serialize a typed event and emit it under its topic.
pub fn publish<E: TopicEvent>(bus: &dyn EventBus, event: &E) {
    match serde_json::to_value(event) {
        Ok(payload) => bus.emit(E::TOPIC, payload),
        Err(e) => tracing::warn!(topic = E::TOPIC, error = %e, "Failed to serialize event"),
    }
}

/// A captured or broadcast event.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl EmittedEvent {
    /// Deserialize the payload as `E` if the topic matches.
    pub fn decode<E: TopicEvent>(&self) -> Option<E> {
        if self.topic != E::TOPIC {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// In-memory event bus for testing.
///
/// Captures all emitted events for later inspection.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EmittedEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.lock().clone()
    }

    /// Get events for a specific topic.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.lock()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Decode every captured event of type `E`.
    pub fn decoded<E: TopicEvent>(&self) -> Vec<E> {
        self.lock().iter().filter_map(EmittedEvent::decode::<E>).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EmittedEvent>> {
        // A panicking test thread must not hide the events captured so far.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.lock().push(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// No-op event bus that discards all events.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}

/// Fan-out bus for any number of live subscribers.
///
/// Subscribers that fall behind by more than `capacity` events lose the
/// oldest ones; the emitter never waits.
pub struct BroadcastEventBus {
    tx: broadcast::Sender<EmittedEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for BroadcastEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        // No subscribers is not an error.
        let _ = self.tx.send(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// Bus that writes every event to the `tracing` log.
///
/// Audio payloads are large, so only their topic is logged.
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        if topic == crate::event_names::AUDIO_CHUNK {
            tracing::trace!(topic, "event");
        } else {
            tracing::debug!(topic, %payload, "event");
        }
    }
}

/// Emits every event to several buses in order.
pub struct FanoutEventBus {
    buses: Vec<EventBusRef>,
}

impl FanoutEventBus {
    pub fn new(buses: Vec<EventBusRef>) -> Self {
        Self { buses }
    }
}

impl EventBus for FanoutEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        for bus in &self.buses {
            bus.emit(topic, payload.clone());
        }
    }
}
