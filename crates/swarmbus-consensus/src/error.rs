//! Consensus errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
