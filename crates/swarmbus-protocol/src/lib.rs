//! SwarmBus Protocol - Core types and message definitions
//!
//! Defines the message envelope, node/agent/task domain types, the typed
//! event enum and the broadcast-channel event bus shared by every SwarmBus
//! crate.

pub mod agent;
pub mod bus;
pub mod constants;
pub mod error;
pub mod events;
pub mod identity;
pub mod message;
pub mod node;
pub mod task;

pub use agent::*;
pub use bus::*;
pub use constants::*;
pub use error::*;
pub use events::*;
pub use identity::*;
pub use message::*;
pub use node::*;
pub use task::*;
