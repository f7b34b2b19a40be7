//! Coordinator errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Routing(#[from] swarmbus_routing::RoutingError),

    #[error(transparent)]
    Consensus(#[from] swarmbus_consensus::ConsensusError),

    #[error(transparent)]
    Task(#[from] swarmbus_tasks::TaskError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("runtime channel closed")]
    ChannelClosed,
}
