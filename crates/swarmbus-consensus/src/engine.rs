//! Quorum voting engine.
//!
//! Lifecycle:
//! 1. `initiate()` - create a round-1 proposal and its high-priority
//!    multicast
//! 2. `handle_proposal()` - store a received proposal and derive a vote
//!    from the injected policy
//! 3. `record_vote()` - tally; at ⌊2N/3⌋ accumulated votes the proposal
//!    resolves and is purged
//! 4. `sweep()` - purge timed-out proposals with no event
//!
//! Single-shot by design: the `round` field travels on the wire but is
//! never advanced.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use swarmbus_protocol::{
    ConsensusOutcome, EventBus, Message, MessagePriority, MessageType, NodeId, SwarmEvent,
    VoteDecision, CONSENSUS_TIMEOUT_MS,
};

use crate::error::ConsensusError;
use crate::policy::ConsensusPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub proposer: NodeId,
    pub kind: String,
    pub value: serde_json::Value,
    /// Always 1; carried for wire compatibility with multi-round schemas.
    pub round: u32,
    pub participants: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: String,
    pub voter: NodeId,
    pub decision: VoteDecision,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ProposalRecord {
    proposal: Proposal,
    votes: HashMap<NodeId, Vote>,
}

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub timeout_ms: u64,
    pub policy: ConsensusPolicy,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            timeout_ms: CONSENSUS_TIMEOUT_MS,
            policy: ConsensusPolicy::AlwaysAccept,
        }
    }
}

pub struct ConsensusEngine {
    node_id: NodeId,
    config: ConsensusConfig,
    proposals: HashMap<String, ProposalRecord>,
    bus: EventBus,
}

impl ConsensusEngine {
    pub fn new(node_id: NodeId, config: ConsensusConfig, bus: EventBus) -> Self {
        Self {
            node_id,
            config,
            proposals: HashMap::new(),
            bus,
        }
    }

    /// Start a round-1 proposal. Returns the proposal id and the
    /// high-priority multicast carrying it to `participants`.
    pub fn initiate(
        &mut self,
        kind: impl Into<String>,
        value: serde_json::Value,
        participants: Vec<NodeId>,
        now: DateTime<Utc>,
    ) -> Result<(String, Message), ConsensusError> {
        if participants.is_empty() {
            return Err(ConsensusError::Validation(
                "consensus requires at least one participant".to_string(),
            ));
        }

        let proposal = Proposal {
            id: Uuid::new_v4().to_string(),
            proposer: self.node_id.clone(),
            kind: kind.into(),
            value,
            round: 1,
            participants: participants.clone(),
            created_at: now,
        };
        let payload = serde_json::to_value(&proposal)?;

        info!(proposal_id = %proposal.id, kind = %proposal.kind, "consensus initiated");
        self.bus.publish(SwarmEvent::ConsensusInitiated {
            proposal_id: proposal.id.clone(),
            proposer: self.node_id.clone(),
        });

        let id = proposal.id.clone();
        self.proposals.insert(
            id.clone(),
            ProposalRecord {
                proposal,
                votes: HashMap::new(),
            },
        );

        let message = Message::new(
            MessageType::Consensus,
            self.node_id.clone(),
            participants,
            payload,
        )
        .with_priority(MessagePriority::High);

        Ok((id, message))
    }

    /// Store a proposal received from a peer and derive this node's vote.
    /// Returns the vote and its unicast back to the proposer.
    pub fn handle_proposal(
        &mut self,
        proposal: Proposal,
        now: DateTime<Utc>,
    ) -> Result<(Vote, Message), ConsensusError> {
        let decision = self.config.policy.evaluate(&proposal);
        let vote = Vote {
            proposal_id: proposal.id.clone(),
            voter: self.node_id.clone(),
            decision,
            reasoning: None,
            cast_at: now,
        };

        debug!(proposal_id = %proposal.id, decision = ?decision, "vote derived from policy");
        self.bus.publish(SwarmEvent::VoteCast {
            proposal_id: proposal.id.clone(),
            voter: self.node_id.clone(),
            decision,
        });

        let proposer = proposal.proposer.clone();
        self.proposals
            .entry(proposal.id.clone())
            .or_insert(ProposalRecord {
                proposal,
                votes: HashMap::new(),
            });

        let payload = serde_json::to_value(&vote)?;
        let message = Message::new(
            MessageType::Consensus,
            self.node_id.clone(),
            vec![proposer],
            payload,
        )
        .with_priority(MessagePriority::High);

        Ok((vote, message))
    }

    /// Tally a vote against a locally known proposal. Resolves and purges
    /// the proposal once quorum is reached.
    pub fn record_vote(
        &mut self,
        vote: Vote,
        known_nodes: usize,
    ) -> Result<Option<ConsensusOutcome>, ConsensusError> {
        let record = self
            .proposals
            .get_mut(&vote.proposal_id)
            .ok_or_else(|| ConsensusError::ProposalNotFound(vote.proposal_id.clone()))?;

        if record.votes.contains_key(&vote.voter) {
            debug!(proposal_id = %vote.proposal_id, voter = %vote.voter, "duplicate vote ignored");
            return Ok(None);
        }
        let proposal_id = vote.proposal_id.clone();
        record.votes.insert(vote.voter.clone(), vote);

        let quorum = quorum_size(known_nodes);
        if record.votes.len() < quorum {
            debug!(
                proposal_id = %proposal_id,
                votes = record.votes.len(),
                quorum,
                "quorum not yet reached"
            );
            return Ok(None);
        }

        let accepts = record
            .votes
            .values()
            .filter(|v| v.decision == VoteDecision::Accept)
            .count();
        let outcome = if accepts >= quorum {
            ConsensusOutcome::Accepted
        } else {
            ConsensusOutcome::Rejected
        };

        info!(
            proposal_id = %proposal_id,
            accepts,
            total = record.votes.len(),
            quorum,
            result = ?outcome,
            "consensus reached"
        );
        self.proposals.remove(&proposal_id);
        self.bus.publish(SwarmEvent::ConsensusReached {
            proposal_id,
            result: outcome,
        });

        Ok(Some(outcome))
    }

    /// Purge proposals older than the timeout. No event is emitted;
    /// callers treat silence as failure.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let timeout_ms = self.config.timeout_ms as i64;
        let before = self.proposals.len();
        self.proposals.retain(|id, record| {
            let age_ms = now
                .signed_duration_since(record.proposal.created_at)
                .num_milliseconds();
            if age_ms > timeout_ms {
                warn!(proposal_id = %id, age_ms, "unresolved proposal purged");
                false
            } else {
                true
            }
        });
        before - self.proposals.len()
    }

    pub fn pending(&self) -> usize {
        self.proposals.len()
    }

    pub fn proposer_of(&self, proposal_id: &str) -> Option<&NodeId> {
        self.proposals.get(proposal_id).map(|r| &r.proposal.proposer)
    }

    pub fn vote_count(&self, proposal_id: &str) -> usize {
        self.proposals
            .get(proposal_id)
            .map(|r| r.votes.len())
            .unwrap_or(0)
    }
}

/// Quorum = ⌊2N/3⌋, clamped to at least one vote so a lone node cannot
/// resolve a proposal with zero ballots.
pub fn quorum_size(known_nodes: usize) -> usize {
    ((2 * known_nodes) / 3).max(1)
}
