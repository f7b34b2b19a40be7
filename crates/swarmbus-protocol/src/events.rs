//! Typed swarm events consumed by external collaborators.
//!
//! Dashboards, loggers and LLM-provider adapters subscribe to this stream;
//! the core never calls them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AgentId, NodeId};
use crate::message::MessageType;

/// Final disposition of a consensus proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusOutcome {
    Accepted,
    Rejected,
}

/// Vote choice on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    Accept,
    Reject,
    Abstain,
}

/// Periodic coordinator counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub known_nodes: usize,
    pub registered_agents: usize,
    pub queued_tasks: usize,
    pub active_assignments: usize,
    pub messages_in_flight: usize,
}

/// Every observable state change in the coordination core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwarmEvent {
    NodeRegistered { node_id: NodeId },
    NodeConnected { node_id: NodeId },
    NodeDisconnected { node_id: NodeId },

    MessageSent {
        message_id: String,
        message_type: MessageType,
        recipients: usize,
    },
    MessageReceived {
        message_id: String,
        sender: NodeId,
    },
    MessageFailed {
        message_id: String,
        reason: String,
    },

    TaskSubmitted { task_id: String },
    TaskAssigned {
        task_id: String,
        agent_id: AgentId,
        confidence: f64,
    },
    TaskCompleted {
        task_id: String,
        agent_id: AgentId,
    },
    TaskFailed {
        task_id: String,
        reason: String,
        permanent: bool,
    },
    TaskCancelled {
        task_id: String,
        reason: String,
    },
    TaskReassigned {
        task_id: String,
        from: AgentId,
        reason: String,
    },
    TaskProgress {
        task_id: String,
        progress: f64,
    },

    ConsensusInitiated {
        proposal_id: String,
        proposer: NodeId,
    },
    ConsensusReached {
        proposal_id: String,
        result: ConsensusOutcome,
    },
    VoteCast {
        proposal_id: String,
        voter: NodeId,
        decision: VoteDecision,
    },

    GossipStarted {
        key: String,
        version: u64,
    },

    MetricsUpdated { snapshot: MetricsSnapshot },
    Shutdown { at: DateTime<Utc> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagged_serialization() {
        let event = SwarmEvent::TaskAssigned {
            task_id: "t1".into(),
            agent_id: AgentId::from("a1"),
            confidence: 0.87,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_assigned");
        assert_eq!(json["task_id"], "t1");

        let restored: SwarmEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(restored, SwarmEvent::TaskAssigned { .. }));
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&ConsensusOutcome::Accepted).unwrap(),
            "\"accepted\""
        );
        assert_eq!(
            serde_json::to_string(&VoteDecision::Abstain).unwrap(),
            "\"abstain\""
        );
    }
}
