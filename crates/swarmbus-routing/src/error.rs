//! Routing-layer errors.

use swarmbus_protocol::{NodeId, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no route to node {0}")]
    NoRoute(NodeId),

    #[error("recipient {0} is offline")]
    RecipientOffline(NodeId),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
