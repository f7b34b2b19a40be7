//! SwarmBus Consensus - single-shot quorum voting
//!
//! Proposals are multicast at high priority, every participant derives a
//! vote from the injected policy, and a proposal resolves once ⌊2N/3⌋
//! votes accumulate. Unresolved proposals are purged by a timeout sweep
//! with no event; callers treat silence as failure.

pub mod engine;
pub mod error;
pub mod policy;

pub use engine::{ConsensusConfig, ConsensusEngine, Proposal, Vote};
pub use error::ConsensusError;
pub use policy::ConsensusPolicy;
