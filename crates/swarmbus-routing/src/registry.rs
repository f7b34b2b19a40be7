//! Node registry: peer identity, capability and derived liveness.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use swarmbus_protocol::{CommunicationNode, NodeId, NodeStatus};

/// Tracks every peer known to the local node.
///
/// Status is derived from heartbeat recency at read time, never stored;
/// see [`CommunicationNode::status`].
pub struct NodeRegistry {
    nodes: HashMap<NodeId, CommunicationNode>,
    heartbeat_interval: Duration,
}

impl NodeRegistry {
    pub fn new(heartbeat_interval_ms: u64) -> Self {
        Self {
            nodes: HashMap::new(),
            heartbeat_interval: Duration::milliseconds(heartbeat_interval_ms as i64),
        }
    }

    /// Register or replace a node. Returns true if the node was new.
    pub fn register(&mut self, node: CommunicationNode) -> bool {
        let is_new = !self.nodes.contains_key(&node.id);
        debug!(node_id = %node.id, is_new, "node registered");
        self.nodes.insert(node.id.clone(), node);
        is_new
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<CommunicationNode> {
        self.nodes.remove(id)
    }

    /// Record a heartbeat. Returns false for unknown nodes.
    pub fn heartbeat(&mut self, id: &NodeId, now: DateTime<Utc>) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.touch(now);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&CommunicationNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut CommunicationNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn status_of(&self, id: &NodeId, now: DateTime<Utc>) -> Option<NodeStatus> {
        self.nodes.get(id).map(|n| n.status(now, self.heartbeat_interval))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node IDs in sorted order. The broadcast tree builds over this.
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Nodes currently online or degraded (still reachable).
    pub fn reachable_ids(&self, now: DateTime<Utc>) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.status(now, self.heartbeat_interval) != NodeStatus::Offline)
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Derived status of every node, for the health loop.
    pub fn statuses(&self, now: DateTime<Utc>) -> Vec<(NodeId, NodeStatus)> {
        self.nodes
            .values()
            .map(|n| (n.id.clone(), n.status(now, self.heartbeat_interval)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommunicationNode> {
        self.nodes.values()
    }
}
