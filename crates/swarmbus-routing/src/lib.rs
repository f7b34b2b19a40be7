//! SwarmBus Routing - message delivery substrate
//!
//! Priority-queued message routing over a node registry and spanning
//! broadcast tree, with a pluggable payload codec (gzip compression plus a
//! cipher seam) and an in-process transport.

pub mod codec;
pub mod error;
pub mod registry;
pub mod router;
pub mod transport;
pub mod tree;

pub use codec::{MessageCodec, NullCipher, PayloadCipher};
pub use error::RoutingError;
pub use registry::NodeRegistry;
pub use router::{MessageHandler, MessageRouter, RouterConfig};
pub use transport::{LoopbackTransport, Transport};
pub use tree::BroadcastTree;
