//! Communication node records and derived liveness status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::NodeId;

/// Liveness status of a node, derived from heartbeat recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Degraded,
    Offline,
}

/// Rolling per-node traffic counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub delivery_failures: u64,
    pub avg_latency_ms: f64,
}

/// A peer registered with the swarm.
///
/// Status is never stored; it is derived from `last_seen` against the
/// configured heartbeat interval, so a node cannot be marked offline by
/// anything but silence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationNode {
    pub id: NodeId,
    pub address: String,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub metrics: NodeMetrics,
    pub last_seen: DateTime<Utc>,
}

impl CommunicationNode {
    pub fn new(id: NodeId, address: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            id,
            address: address.into(),
            capabilities,
            metrics: NodeMetrics::default(),
            last_seen: Utc::now(),
        }
    }

    /// Derive liveness at `now`: offline past 3x the heartbeat interval,
    /// degraded past 2x, online otherwise.
    pub fn status(&self, now: DateTime<Utc>, heartbeat_interval: Duration) -> NodeStatus {
        let silence = now.signed_duration_since(self.last_seen);
        if silence > heartbeat_interval * 3 {
            NodeStatus::Offline
        } else if silence > heartbeat_interval * 2 {
            NodeStatus::Degraded
        } else {
            NodeStatus::Online
        }
    }

    /// Record a heartbeat observed at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
    }
}
