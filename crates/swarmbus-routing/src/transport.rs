//! Delivery seam between the router and the outside world.
//!
//! The core is transport-agnostic: production deployments back this trait
//! with a real wire, tests and single-process swarms use
//! [`LoopbackTransport`].

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use swarmbus_protocol::{Message, NodeId};

use crate::error::RoutingError;

pub trait Transport: Send {
    /// Hand one message to one recipient. Failures are per-recipient and
    /// never abort a fan-out.
    fn deliver(&mut self, recipient: &NodeId, message: &Message) -> Result<(), RoutingError>;

    /// Make `node_id` addressable. No-op for transports that resolve
    /// endpoints externally.
    fn open_endpoint(&mut self, _node_id: &NodeId) {}

    /// Pull messages addressed to `recipient` that this transport buffered
    /// locally. Wire-backed transports push inbound traffic through the
    /// coordinator instead and leave this empty.
    fn collect(&mut self, _recipient: &NodeId) -> Vec<Message> {
        Vec::new()
    }
}

/// In-process transport: one bounded inbox per registered endpoint.
pub struct LoopbackTransport {
    inboxes: HashMap<NodeId, VecDeque<Message>>,
    capacity: usize,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            inboxes: HashMap::new(),
            capacity: 4_096,
        }
    }

    pub fn register_endpoint(&mut self, node_id: NodeId) {
        self.inboxes.entry(node_id).or_default();
    }

    pub fn remove_endpoint(&mut self, node_id: &NodeId) {
        self.inboxes.remove(node_id);
    }

    /// Take every queued message for `node_id`.
    pub fn drain(&mut self, node_id: &NodeId) -> Vec<Message> {
        self.inboxes
            .get_mut(node_id)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn inbox_len(&self, node_id: &NodeId) -> usize {
        self.inboxes.get(node_id).map(VecDeque::len).unwrap_or(0)
    }
}

impl Transport for LoopbackTransport {
    fn deliver(&mut self, recipient: &NodeId, message: &Message) -> Result<(), RoutingError> {
        let inbox = self
            .inboxes
            .get_mut(recipient)
            .ok_or_else(|| RoutingError::NoRoute(recipient.clone()))?;
        if inbox.len() >= self.capacity {
            return Err(RoutingError::Delivery(format!(
                "inbox full for node {recipient}"
            )));
        }
        trace!(message_id = %message.id, recipient = %recipient, "loopback delivery");
        inbox.push_back(message.clone());
        Ok(())
    }

    fn open_endpoint(&mut self, node_id: &NodeId) {
        self.register_endpoint(node_id.clone());
    }

    fn collect(&mut self, recipient: &NodeId) -> Vec<Message> {
        self.drain(recipient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmbus_protocol::MessageType;

    #[test]
    fn test_deliver_and_drain() {
        let mut transport = LoopbackTransport::new();
        let b = NodeId::from("b");
        transport.register_endpoint(b.clone());

        let msg = Message::new(
            MessageType::Data,
            NodeId::from("a"),
            vec![b.clone()],
            serde_json::json!({}),
        );
        transport.deliver(&b, &msg).unwrap();
        assert_eq!(transport.inbox_len(&b), 1);

        let drained = transport.drain(&b);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, msg.id);
        assert_eq!(transport.inbox_len(&b), 0);
    }

    #[test]
    fn test_unknown_endpoint_is_no_route() {
        let mut transport = LoopbackTransport::new();
        let msg = Message::new(
            MessageType::Data,
            NodeId::from("a"),
            vec![NodeId::from("ghost")],
            serde_json::json!({}),
        );
        let err = transport.deliver(&NodeId::from("ghost"), &msg).unwrap_err();
        assert!(matches!(err, RoutingError::NoRoute(_)));
    }
}
