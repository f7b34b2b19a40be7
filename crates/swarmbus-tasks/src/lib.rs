//! SwarmBus Tasks - distribution engine
//!
//! Priority queueing, complex-task decomposition, capability-aware
//! assignment scoring, workload imbalance detection and failure/retry
//! handling. Pure state machines; the coordinator drives them from its
//! periodic ticks.

pub mod assign;
pub mod balance;
pub mod decompose;
pub mod error;
pub mod failure;
pub mod queue;

pub use assign::{AssignmentOptimizer, HeuristicPredictor, SuccessPredictor};
pub use balance::{ImbalanceReport, NoRebalance, RebalanceAction, RebalancePolicy, WorkloadBalancer};
pub use decompose::TaskDecomposer;
pub use error::TaskError;
pub use failure::{FailureDisposition, FailureHandler};
pub use queue::TaskQueue;
