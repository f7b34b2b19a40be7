//! Workload imbalance detection.
//!
//! Compares per-agent utilization to the fleet mean. Rebalancing only
//! triggers when over- and under-loaded agents exist simultaneously and
//! the overall severity clears the threshold; what to move is left to the
//! injected [`RebalancePolicy`].

use tracing::debug;

use swarmbus_protocol::{AgentId, AgentProfile, REBALANCE_DEVIATION, REBALANCE_SEVERITY_THRESHOLD};

#[derive(Debug, Clone)]
pub struct ImbalanceReport {
    pub mean_utilization: f64,
    /// More than `deviation` above the mean.
    pub overloaded: Vec<AgentId>,
    /// More than `deviation` below the mean.
    pub underloaded: Vec<AgentId>,
    /// Mean absolute deviation from the fleet mean.
    pub severity: f64,
    pub should_rebalance: bool,
}

#[derive(Debug, Clone)]
pub enum RebalanceAction {
    MoveLoad { from: AgentId, to: AgentId },
}

/// Decides what to actually move once an imbalance is detected.
pub trait RebalancePolicy: Send + Sync {
    fn plan(&self, report: &ImbalanceReport, agents: &[&AgentProfile]) -> Vec<RebalanceAction>;
}

/// Detection-only default: report imbalance, move nothing.
pub struct NoRebalance;

impl RebalancePolicy for NoRebalance {
    fn plan(&self, _report: &ImbalanceReport, _agents: &[&AgentProfile]) -> Vec<RebalanceAction> {
        Vec::new()
    }
}

pub struct WorkloadBalancer {
    deviation: f64,
    severity_threshold: f64,
}

impl WorkloadBalancer {
    pub fn new() -> Self {
        Self {
            deviation: REBALANCE_DEVIATION,
            severity_threshold: REBALANCE_SEVERITY_THRESHOLD,
        }
    }

    pub fn assess(&self, agents: &[&AgentProfile]) -> ImbalanceReport {
        if agents.is_empty() {
            return ImbalanceReport {
                mean_utilization: 0.0,
                overloaded: Vec::new(),
                underloaded: Vec::new(),
                severity: 0.0,
                should_rebalance: false,
            };
        }

        let mean =
            agents.iter().map(|a| a.utilization()).sum::<f64>() / agents.len() as f64;

        let mut overloaded = Vec::new();
        let mut underloaded = Vec::new();
        let mut total_deviation = 0.0;
        for agent in agents {
            let delta = agent.utilization() - mean;
            total_deviation += delta.abs();
            if delta > self.deviation {
                overloaded.push(agent.agent_id.clone());
            } else if delta < -self.deviation {
                underloaded.push(agent.agent_id.clone());
            }
        }
        let severity = total_deviation / agents.len() as f64;
        let should_rebalance =
            !overloaded.is_empty() && !underloaded.is_empty() && severity > self.severity_threshold;

        if should_rebalance {
            debug!(
                mean_utilization = mean,
                severity,
                overloaded = overloaded.len(),
                underloaded = underloaded.len(),
                "workload imbalance detected"
            );
        }

        ImbalanceReport {
            mean_utilization: mean,
            overloaded,
            underloaded,
            severity,
            should_rebalance,
        }
    }
}

impl Default for WorkloadBalancer {
    fn default() -> Self {
        Self::new()
    }
}
