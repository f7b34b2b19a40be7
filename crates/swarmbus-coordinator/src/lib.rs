//! SwarmBus Coordinator - the engine that owns the swarm state
//!
//! One state struct holds every map (nodes, agents, tasks, assignments);
//! commands mutate it only through coordinator methods, and the periodic
//! loops run from an explicit `advance(now)` step so every behavior is
//! deterministic under test. [`runtime::SwarmRuntime`] wraps the
//! coordinator in a tokio select loop for production.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod runtime;

pub use config::CoordinatorConfig;
pub use coordinator::{QueueStatus, SwarmCoordinator};
pub use error::CoordinatorError;
pub use runtime::{Command, CommandHandle, SwarmRuntime};
