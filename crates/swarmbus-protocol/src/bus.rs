//! Broadcast-channel event bus.
//!
//! In-memory pub/sub over `tokio::sync::broadcast`. Publishing never blocks
//! and never fails; with no subscribers the event is simply dropped. Slow
//! subscribers lose the oldest buffered events (the channel's lagging
//! semantics), which is acceptable for observability consumers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::events::SwarmEvent;

pub const DEFAULT_BUS_CAPACITY: usize = 1_024;

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<SwarmEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: SwarmEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        if delivered == 0 {
            debug!("event published with no subscribers");
        }
    }

    /// Subscribe to all events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
