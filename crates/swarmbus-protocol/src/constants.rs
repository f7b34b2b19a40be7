//! Protocol-wide defaults and tuning constants.

/// Default message time-to-live before it is purged from queues and history.
pub const DEFAULT_TTL_MS: u64 = 60_000;

/// Bounded FIFO message history capacity.
pub const MESSAGE_HISTORY_CAP: usize = 1_000;

/// Messages drained per priority band per processing tick.
pub const MESSAGES_PER_BAND_PER_TICK: usize = 10;

/// Message processing tick interval.
pub const PROCESS_INTERVAL_MS: u64 = 100;

/// Default heartbeat interval. Node status derivation multiplies this:
/// degraded past 2x, offline past 3x.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Gossip round interval.
pub const DEFAULT_GOSSIP_INTERVAL_MS: u64 = 10_000;

/// Peers contacted per key per gossip round.
pub const GOSSIP_FANOUT: usize = 3;

/// Consensus proposals older than this are purged without an event.
pub const CONSENSUS_TIMEOUT_MS: u64 = 30_000;

/// Task distribution tick interval.
pub const DISTRIBUTION_INTERVAL_MS: u64 = 1_000;

/// Tasks pulled from the queue per distribution tick.
pub const TASKS_PER_DISTRIBUTION_TICK: usize = 5;

/// Compression kicks in above this payload size.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1_024;

/// Default QoS delivery reliability target.
pub const DEFAULT_RELIABILITY: f64 = 0.95;

/// Minimum trust score for assignment eligibility.
pub const MIN_TRUST_SCORE: f64 = 0.5;

/// Utilization deviation from the fleet mean that marks an agent
/// over- or under-loaded.
pub const REBALANCE_DEVIATION: f64 = 0.3;

/// Imbalance severity required before rebalancing triggers.
pub const REBALANCE_SEVERITY_THRESHOLD: f64 = 0.3;

/// A task running longer than this multiple of its estimate is stuck.
pub const STUCK_TASK_MULTIPLIER: f64 = 2.0;

/// Escalation trigger: reassign after this long without progress.
pub const ESCALATION_NO_PROGRESS_MS: u64 = 15 * 60 * 1_000;
