//! SwarmBus State - versioned key/value gossip
//!
//! Anti-entropy propagation of versioned state with last-writer-wins
//! conflict resolution. Convergence relies on periodic random peer
//! exchange, not on causal ordering.

pub mod gossip;

pub use gossip::{GossipConfig, GossipEngine, GossipState};
