//! Capability-aware assignment scoring.
//!
//! An agent is eligible only when it covers every required capability, has
//! load headroom, is not explicitly excluded and carries trust >= 0.5.
//! Eligible agents are scored with a fixed-weight blend; the highest score
//! wins and the earliest index breaks ties.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use swarmbus_protocol::{
    AgentId, AgentProfile, EscalationAction, EscalationCondition, EscalationTrigger,
    MonitoringPlan, RankedAlternative, ResourceAllocation, TaskAssignment, TaskDefinition,
    ESCALATION_NO_PROGRESS_MS, MIN_TRUST_SCORE, STUCK_TASK_MULTIPLIER,
};

use crate::error::TaskError;

/// Score weights: capability 0.3, performance 0.3, load headroom 0.2,
/// trust 0.2.
const W_CAPABILITY: f64 = 0.3;
const W_PERFORMANCE: f64 = 0.3;
const W_LOAD: f64 = 0.2;
const W_TRUST: f64 = 0.2;

/// Resource grants are clipped to these ceilings.
const MAX_CPU_ALLOCATION: f64 = 4.0;
const MAX_MEMORY_ALLOCATION_MB: u64 = 8_192;

/// Estimates the probability that an agent completes a task successfully.
/// The heuristic default blends track record and spare capacity; an
/// ML-backed implementation plugs in through this seam.
pub trait SuccessPredictor: Send + Sync {
    fn predict(&self, task: &TaskDefinition, agent: &AgentProfile) -> f64;
}

pub struct HeuristicPredictor;

impl SuccessPredictor for HeuristicPredictor {
    fn predict(&self, task: &TaskDefinition, agent: &AgentProfile) -> f64 {
        let performance = performance_score(task, agent);
        let headroom = 1.0 - agent.utilization();
        (0.5 * performance + 0.3 * headroom + 0.2 * agent.trust_score).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
struct ScoredCandidate {
    index: usize,
    agent_id: AgentId,
    score: f64,
    capability_match: f64,
    performance: f64,
    load_headroom: f64,
    trust: f64,
}

pub struct AssignmentOptimizer {
    predictor: Arc<dyn SuccessPredictor>,
}

impl AssignmentOptimizer {
    pub fn new(predictor: Arc<dyn SuccessPredictor>) -> Self {
        Self { predictor }
    }

    /// Pick the best eligible agent for `task` out of `agents` (in a
    /// caller-stable order) and build the full assignment record.
    pub fn select(
        &self,
        task: &TaskDefinition,
        agents: &[&AgentProfile],
        excluded: &HashSet<AgentId>,
        now: DateTime<Utc>,
    ) -> Result<TaskAssignment, TaskError> {
        let required = &task.requirements.capabilities;

        let mut capable = 0;
        let mut with_headroom = 0;
        let mut candidates: Vec<ScoredCandidate> = Vec::new();

        for (index, agent) in agents.iter().enumerate() {
            if excluded.contains(&agent.agent_id) || !agent.available {
                continue;
            }
            if !agent.covers(required) {
                continue;
            }
            capable += 1;
            if !agent.has_headroom() {
                continue;
            }
            with_headroom += 1;
            if agent.trust_score < MIN_TRUST_SCORE {
                continue;
            }

            let capability_match = capability_match(required, agent);
            let performance = performance_score(task, agent);
            let load_headroom = 1.0 - agent.utilization();
            let trust = agent.trust_score;
            let score = W_CAPABILITY * capability_match
                + W_PERFORMANCE * performance
                + W_LOAD * load_headroom
                + W_TRUST * trust;

            candidates.push(ScoredCandidate {
                index,
                agent_id: agent.agent_id.clone(),
                score,
                capability_match,
                performance,
                load_headroom,
                trust,
            });
        }

        if candidates.is_empty() {
            return Err(TaskError::NoEligibleAgent {
                task_id: task.id.clone(),
                candidates: agents.len(),
                capable,
                with_headroom,
            });
        }

        // Highest score wins; on equal scores the earliest index does.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        let winner = &candidates[0];
        let agent = agents[winner.index];

        let confidence = self.predictor.predict(task, agent).clamp(0.0, 1.0);
        let alternatives: Vec<RankedAlternative> = candidates[1..]
            .iter()
            .take(3)
            .map(|c| RankedAlternative {
                agent_id: c.agent_id.clone(),
                score: c.score,
            })
            .collect();

        let reasoning = vec![
            format!(
                "covers all {} required capabilities (match {:.2})",
                required.len(),
                winner.capability_match
            ),
            format!("performance {:.2} on the required capability set", winner.performance),
            format!(
                "load {}/{} leaves headroom {:.2}",
                agent.current_load, agent.max_load, winner.load_headroom
            ),
            format!("trust {:.2}", winner.trust),
            format!(
                "composite score {:.3}, best of {} eligible agents",
                winner.score,
                candidates.len()
            ),
        ];

        debug!(
            task_id = %task.id,
            agent_id = %winner.agent_id,
            score = winner.score,
            eligible = candidates.len(),
            "assignment selected"
        );

        Ok(TaskAssignment {
            task_id: task.id.clone(),
            agent_id: winner.agent_id.clone(),
            confidence,
            reasoning,
            alternatives,
            resources: ResourceAllocation {
                cpu: task.requirements.cpu.min(MAX_CPU_ALLOCATION),
                memory_mb: task.requirements.memory_mb.min(MAX_MEMORY_ALLOCATION_MB),
            },
            expected_quality: winner.performance.max(task.requirements.min_quality).min(1.0),
            monitoring: monitoring_plan(task),
            assigned_at: now,
            last_progress_at: None,
        })
    }
}

/// Fraction of required capabilities the agent covers. 1.0 for every
/// eligible agent; partial values only occur pre-gate.
fn capability_match(required: &[String], agent: &AgentProfile) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let matched = required
        .iter()
        .filter(|c| agent.capabilities.contains(c))
        .count();
    matched as f64 / required.len() as f64
}

/// Mean recorded performance over the required capabilities; unknown
/// capabilities score a neutral 0.5.
fn performance_score(task: &TaskDefinition, agent: &AgentProfile) -> f64 {
    let required = &task.requirements.capabilities;
    if required.is_empty() {
        return 0.5;
    }
    let total: f64 = required
        .iter()
        .map(|c| agent.performance.get(c).copied().unwrap_or(0.5))
        .sum();
    total / required.len() as f64
}

fn monitoring_plan(task: &TaskDefinition) -> MonitoringPlan {
    MonitoringPlan {
        progress_check_ms: (task.estimated_duration_ms / 4).max(30_000),
        performance_check_ms: (task.estimated_duration_ms / 2).max(60_000),
        escalations: vec![
            EscalationTrigger {
                condition: EscalationCondition::NoProgressFor {
                    duration_ms: ESCALATION_NO_PROGRESS_MS,
                },
                action: EscalationAction::Reassign,
            },
            EscalationTrigger {
                condition: EscalationCondition::RuntimeExceeds {
                    multiplier: STUCK_TASK_MULTIPLIER,
                },
                action: EscalationAction::Reassign,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmbus_protocol::TaskDefinition;

    fn agent(id: &str, capabilities: &[&str], trust: f64) -> AgentProfile {
        let mut profile = AgentProfile::new(
            AgentId::from(id),
            capabilities.iter().map(|s| s.to_string()).collect(),
            4,
        );
        profile.trust_score = trust;
        profile
    }

    fn optimizer() -> AssignmentOptimizer {
        AssignmentOptimizer::new(Arc::new(HeuristicPredictor))
    }

    fn ocr_task() -> TaskDefinition {
        TaskDefinition::new("scan invoices").with_capabilities(vec!["ocr".into()])
    }

    #[test]
    fn test_missing_capability_never_chosen() {
        // The incapable agent would dominate on every other dimension.
        let mut star = agent("star", &["nlp"], 1.0);
        star.performance.insert("nlp".into(), 1.0);
        let plain = agent("plain", &["ocr"], 0.5);

        let task = ocr_task();
        let agents = [&star, &plain];
        let assignment = optimizer()
            .select(&task, &agents, &HashSet::new(), Utc::now())
            .unwrap();
        assert_eq!(assignment.agent_id, AgentId::from("plain"));
    }

    #[test]
    fn test_low_trust_gated() {
        let untrusted = agent("untrusted", &["ocr"], 0.49);
        let task = ocr_task();
        let agents = [&untrusted];
        let result = optimizer().select(&task, &agents, &HashSet::new(), Utc::now());
        assert!(matches!(result, Err(TaskError::NoEligibleAgent { .. })));
    }

    #[test]
    fn test_full_load_gated() {
        let mut busy = agent("busy", &["ocr"], 0.9);
        busy.current_load = busy.max_load;
        let task = ocr_task();
        let agents = [&busy];
        let result = optimizer().select(&task, &agents, &HashSet::new(), Utc::now());
        assert!(matches!(
            result,
            Err(TaskError::NoEligibleAgent { capable: 1, with_headroom: 0, .. })
        ));
    }

    #[test]
    fn test_excluded_agent_skipped() {
        let a = agent("a", &["ocr"], 0.9);
        let b = agent("b", &["ocr"], 0.9);
        let task = ocr_task();
        let excluded: HashSet<AgentId> = [AgentId::from("a")].into_iter().collect();
        let agents = [&a, &b];
        let assignment = optimizer().select(&task, &agents, &excluded, Utc::now()).unwrap();
        assert_eq!(assignment.agent_id, AgentId::from("b"));
    }

    #[test]
    fn test_higher_performance_wins() {
        let mut fast = agent("fast", &["ocr"], 0.7);
        fast.performance.insert("ocr".into(), 0.95);
        let mut slow = agent("slow", &["ocr"], 0.7);
        slow.performance.insert("ocr".into(), 0.4);

        let task = ocr_task();
        let agents = [&slow, &fast];
        let assignment = optimizer().select(&task, &agents, &HashSet::new(), Utc::now()).unwrap();
        assert_eq!(assignment.agent_id, AgentId::from("fast"));
        assert_eq!(assignment.alternatives.len(), 1);
        assert_eq!(assignment.alternatives[0].agent_id, AgentId::from("slow"));
    }

    #[test]
    fn test_tie_breaks_on_first_index() {
        let a = agent("first", &["ocr"], 0.8);
        let b = agent("second", &["ocr"], 0.8);
        let task = ocr_task();
        let agents = [&a, &b];
        let assignment = optimizer().select(&task, &agents, &HashSet::new(), Utc::now()).unwrap();
        assert_eq!(assignment.agent_id, AgentId::from("first"));
    }

    #[test]
    fn test_resources_clipped() {
        let a = agent("a", &["ocr"], 0.8);
        let mut task = ocr_task();
        task.requirements.cpu = 64.0;
        task.requirements.memory_mb = 1 << 20;
        let agents = [&a];
        let assignment = optimizer().select(&task, &agents, &HashSet::new(), Utc::now()).unwrap();
        assert_eq!(assignment.resources.cpu, MAX_CPU_ALLOCATION);
        assert_eq!(assignment.resources.memory_mb, MAX_MEMORY_ALLOCATION_MB);
    }

    #[test]
    fn test_assignment_carries_reasoning_and_monitoring() {
        let a = agent("a", &["ocr"], 0.8);
        let task = ocr_task();
        let agents = [&a];
        let assignment = optimizer().select(&task, &agents, &HashSet::new(), Utc::now()).unwrap();

        assert!(!assignment.reasoning.is_empty());
        assert!(assignment.confidence > 0.0 && assignment.confidence <= 1.0);
        assert_eq!(assignment.monitoring.escalations.len(), 2);
        assert!(assignment
            .monitoring
            .escalations
            .iter()
            .any(|e| matches!(e.condition, EscalationCondition::NoProgressFor { .. })));
    }
}
