//! Agent capacity profiles and task assignment records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::AgentId;

/// Declared capacity and track record of a worker agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: AgentId,
    pub capabilities: Vec<String>,
    /// Invariant: current_load <= max_load, enforced at assignment time.
    pub current_load: u32,
    pub max_load: u32,
    /// Success score per capability, in [0, 1].
    #[serde(default)]
    pub performance: HashMap<String, f64>,
    pub trust_score: f64,
    pub available: bool,
}

impl AgentProfile {
    pub fn new(agent_id: AgentId, capabilities: Vec<String>, max_load: u32) -> Self {
        Self {
            agent_id,
            capabilities,
            current_load: 0,
            max_load,
            performance: HashMap::new(),
            trust_score: 0.7,
            available: true,
        }
    }

    /// Fraction of capacity in use.
    pub fn utilization(&self) -> f64 {
        if self.max_load == 0 {
            return 1.0;
        }
        self.current_load as f64 / self.max_load as f64
    }

    pub fn has_headroom(&self) -> bool {
        self.current_load < self.max_load
    }

    /// Whether this agent's capability set covers all of `required`.
    pub fn covers(&self, required: &[String]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }
}

/// A ranked runner-up considered during assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedAlternative {
    pub agent_id: AgentId,
    pub score: f64,
}

/// Resources granted to an assignment, clipped to the task's request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub cpu: f64,
    pub memory_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationAction {
    Reassign,
    Alert,
}

/// Condition that fires an escalation during monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationCondition {
    /// No progress report for this long.
    NoProgressFor { duration_ms: u64 },
    /// Running past this multiple of the estimated duration.
    RuntimeExceeds { multiplier: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTrigger {
    pub condition: EscalationCondition,
    pub action: EscalationAction,
}

/// How an in-flight assignment is watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringPlan {
    pub progress_check_ms: u64,
    pub performance_check_ms: u64,
    pub escalations: Vec<EscalationTrigger>,
}

/// A live task-to-agent binding.
///
/// Exists only while the task is running; removed on completion, failure,
/// cancellation or reassignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: String,
    pub agent_id: AgentId,
    /// Predicted probability of success, from the injected predictor.
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub alternatives: Vec<RankedAlternative>,
    pub resources: ResourceAllocation,
    pub expected_quality: f64,
    pub monitoring: MonitoringPlan,
    pub assigned_at: DateTime<Utc>,
    #[serde(default)]
    pub last_progress_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_cover() {
        let agent = AgentProfile::new(AgentId::from("a1"), vec!["ocr".into(), "nlp".into()], 4);
        assert!(agent.covers(&["ocr".into()]));
        assert!(agent.covers(&["ocr".into(), "nlp".into()]));
        assert!(!agent.covers(&["ocr".into(), "vision".into()]));
        assert!(agent.covers(&[]));
    }

    #[test]
    fn test_utilization_and_headroom() {
        let mut agent = AgentProfile::new(AgentId::from("a1"), vec![], 4);
        assert_eq!(agent.utilization(), 0.0);
        agent.current_load = 4;
        assert_eq!(agent.utilization(), 1.0);
        assert!(!agent.has_headroom());

        let zero_cap = AgentProfile::new(AgentId::from("a2"), vec![], 0);
        assert_eq!(zero_cap.utilization(), 1.0);
        assert!(!zero_cap.has_headroom());
    }
}
