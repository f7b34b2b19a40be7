//! Priority-queued message router.
//!
//! Outbound: `send` validates the envelope, runs the payload codec, records
//! the message in a bounded FIFO history and enqueues it by priority.
//! `process_tick` drains up to K messages per band in strict priority
//! order; a lower band only progresses once every higher band emptied
//! within the tick. Starving background traffic under sustained emergency
//! load is the documented cost of that rule.
//!
//! Inbound: checksum and TTL are verified before the codec reverses the
//! wire transforms; user handlers run after the built-in classification.
//! Failures are isolated per message and surface as `message:failed`
//! events, never as a tick abort.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use swarmbus_protocol::{
    EventBus, Message, MessagePriority, MessageType, NodeId, NodeStatus, SwarmEvent,
    MESSAGES_PER_BAND_PER_TICK, MESSAGE_HISTORY_CAP,
};

use crate::codec::MessageCodec;
use crate::error::RoutingError;
use crate::registry::NodeRegistry;
use crate::transport::Transport;
use crate::tree::BroadcastTree;

pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Messages drained per priority band per tick.
    pub max_per_band_per_tick: usize,
    pub history_cap: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_per_band_per_tick: MESSAGES_PER_BAND_PER_TICK,
            history_cap: MESSAGE_HISTORY_CAP,
        }
    }
}

pub struct MessageRouter {
    local_id: NodeId,
    config: RouterConfig,
    codec: MessageCodec,
    bus: EventBus,
    /// One FIFO queue per priority band, emergency first.
    queues: [VecDeque<Message>; 5],
    history: VecDeque<Message>,
    handlers: HashMap<MessageType, Vec<MessageHandler>>,
}

impl MessageRouter {
    pub fn new(local_id: NodeId, config: RouterConfig, codec: MessageCodec, bus: EventBus) -> Self {
        Self {
            local_id,
            config,
            codec,
            bus,
            queues: Default::default(),
            history: VecDeque::new(),
            handlers: HashMap::new(),
        }
    }

    /// Accept a message for delivery. Validates the recipient shape for the
    /// type, applies the payload codec, restamps the checksum over the wire
    /// payload and enqueues into the priority band.
    pub fn send(&mut self, mut message: Message) -> Result<String, RoutingError> {
        match message.message_type {
            MessageType::Unicast if message.recipients.len() != 1 => {
                return Err(RoutingError::Validation(format!(
                    "unicast requires exactly one recipient, got {}",
                    message.recipients.len()
                )));
            }
            MessageType::Multicast if message.recipients.is_empty() => {
                return Err(RoutingError::Validation(
                    "multicast requires at least one recipient".to_string(),
                ));
            }
            _ => {}
        }

        self.codec.encode(&mut message)?;
        message.reseal();

        if self.history.len() >= self.config.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(message.clone());

        let id = message.id.clone();
        let band = message.priority.band();
        debug!(
            message_id = %id,
            message_type = ?message.message_type,
            priority = ?message.priority,
            "message enqueued"
        );
        self.queues[band].push_back(message);
        Ok(id)
    }

    /// Drain the queues for one tick. Returns the number of messages
    /// dispatched.
    pub fn process_tick(
        &mut self,
        now: DateTime<Utc>,
        registry: &NodeRegistry,
        tree: &BroadcastTree,
        transport: &mut dyn Transport,
    ) -> usize {
        let mut dispatched = 0;
        for priority in MessagePriority::DESCENDING {
            let band = priority.band();
            let mut drained = 0;
            while drained < self.config.max_per_band_per_tick {
                let Some(message) = self.queues[band].pop_front() else {
                    break;
                };
                if message.is_expired(now) {
                    debug!(message_id = %message.id, "expired message purged from queue");
                    continue;
                }
                drained += 1;
                match self.dispatch(&message, now, registry, tree, transport) {
                    Ok(delivered) => {
                        dispatched += 1;
                        self.bus.publish(SwarmEvent::MessageSent {
                            message_id: message.id.clone(),
                            message_type: message.message_type,
                            recipients: delivered,
                        });
                    }
                    Err(e) => {
                        warn!(message_id = %message.id, error = %e, "routing failed");
                        self.bus.publish(SwarmEvent::MessageFailed {
                            message_id: message.id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            // Strict priority: anything left in this band blocks the lower
            // ones until the next tick.
            if !self.queues[band].is_empty() {
                break;
            }
        }
        dispatched
    }

    /// Route one message by type. Returns the number of recipients the
    /// transport accepted it for.
    fn dispatch(
        &self,
        message: &Message,
        now: DateTime<Utc>,
        registry: &NodeRegistry,
        tree: &BroadcastTree,
        transport: &mut dyn Transport,
    ) -> Result<usize, RoutingError> {
        let targets: Vec<NodeId> = match message.message_type {
            MessageType::Broadcast => tree
                .traverse()
                .into_iter()
                .filter(|id| *id != message.sender && *id != self.local_id)
                .collect(),
            _ => message.recipients.clone(),
        };

        if targets.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0;
        for target in &targets {
            match registry.status_of(target, now) {
                Some(NodeStatus::Offline) => {
                    warn!(message_id = %message.id, recipient = %target, "recipient offline");
                    continue;
                }
                None => {
                    warn!(message_id = %message.id, recipient = %target, "recipient unknown");
                    continue;
                }
                _ => {}
            }
            match transport.deliver(target, message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        message_id = %message.id,
                        recipient = %target,
                        error = %e,
                        "delivery failed"
                    );
                }
            }
        }

        if delivered == 0 {
            return Err(RoutingError::Delivery(format!(
                "no reachable recipient out of {}",
                targets.len()
            )));
        }
        Ok(delivered)
    }

    /// Inbound processing: verify, decode, dispatch to handlers.
    ///
    /// Checksum mismatches and expired messages are dropped with a warning
    /// and `Ok(None)`; they are never surfaced as errors. The decoded
    /// message is returned for built-in handling by the coordinator.
    pub fn handle_inbound(
        &mut self,
        mut message: Message,
        now: DateTime<Utc>,
    ) -> Result<Option<Message>, RoutingError> {
        if !message.verify_checksum() {
            warn!(message_id = %message.id, sender = %message.sender, "checksum mismatch, dropped");
            return Ok(None);
        }
        if message.is_expired(now) {
            debug!(message_id = %message.id, "expired message dropped on receipt");
            return Ok(None);
        }

        self.codec.decode(&mut message)?;
        message.reseal();

        self.bus.publish(SwarmEvent::MessageReceived {
            message_id: message.id.clone(),
            sender: message.sender.clone(),
        });

        if let Some(handlers) = self.handlers.get(&message.message_type) {
            for handler in handlers {
                handler(&message);
            }
        }
        Ok(Some(message))
    }

    pub fn register_handler(&mut self, message_type: MessageType, handler: MessageHandler) {
        self.handlers.entry(message_type).or_default().push(handler);
    }

    /// Drop expired messages from the queues and the history.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before: usize =
            self.queues.iter().map(VecDeque::len).sum::<usize>() + self.history.len();
        for queue in &mut self.queues {
            queue.retain(|m| !m.is_expired(now));
        }
        self.history.retain(|m| !m.is_expired(now));
        let after: usize =
            self.queues.iter().map(VecDeque::len).sum::<usize>() + self.history.len();
        before - after
    }

    pub fn queued_len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &Message> {
        self.history.iter()
    }
}
