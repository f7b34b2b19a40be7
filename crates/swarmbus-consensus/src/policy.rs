//! Injectable vote derivation policy.
//!
//! Replaces the placeholder evaluator of early prototypes: every deployment
//! picks a variant explicitly, and the threshold/custom variants are the
//! ones meant for production use.

use std::sync::Arc;

use swarmbus_protocol::VoteDecision;

use crate::engine::Proposal;

#[derive(Clone)]
pub enum ConsensusPolicy {
    AlwaysAccept,
    AlwaysReject,
    /// Accept when a numeric field of the proposal value is at least `min`;
    /// reject below it; abstain when the field is missing.
    ThresholdOnField { field: String, min: f64 },
    Custom(Arc<dyn Fn(&Proposal) -> VoteDecision + Send + Sync>),
}

impl ConsensusPolicy {
    pub fn evaluate(&self, proposal: &Proposal) -> VoteDecision {
        match self {
            ConsensusPolicy::AlwaysAccept => VoteDecision::Accept,
            ConsensusPolicy::AlwaysReject => VoteDecision::Reject,
            ConsensusPolicy::ThresholdOnField { field, min } => {
                match proposal.value.get(field).and_then(|v| v.as_f64()) {
                    Some(actual) if actual >= *min => VoteDecision::Accept,
                    Some(_) => VoteDecision::Reject,
                    None => VoteDecision::Abstain,
                }
            }
            ConsensusPolicy::Custom(f) => f(proposal),
        }
    }
}

impl std::fmt::Debug for ConsensusPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsensusPolicy::AlwaysAccept => write!(f, "AlwaysAccept"),
            ConsensusPolicy::AlwaysReject => write!(f, "AlwaysReject"),
            ConsensusPolicy::ThresholdOnField { field, min } => {
                write!(f, "ThresholdOnField({field} >= {min})")
            }
            ConsensusPolicy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
