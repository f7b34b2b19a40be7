//! Complex-task decomposition.
//!
//! Complex and expert tasks never queue directly; they split into an
//! analysis subtask, one execution subtask per required capability
//! (parallelizable, gated on analysis) and an integration subtask gated on
//! every execution subtask. Each subtask is an ordinary
//! [`TaskDefinition`] carrying `parent_id`/`order` metadata and is queued
//! independently.

use tracing::debug;
use uuid::Uuid;

use swarmbus_protocol::{
    Checkpoint, CoordinationMode, DecomposedTask, ExecutionPhase, ExecutionPlan,
    ExecutionStrategy, TaskComplexity, TaskDefinition,
};

pub struct TaskDecomposer;

impl TaskDecomposer {
    /// Split a complex/expert task into dependency-ordered subtasks with an
    /// execution plan. The parent is not queued; only the subtasks are.
    pub fn decompose(task: &TaskDefinition) -> DecomposedTask {
        let capabilities = &task.requirements.capabilities;
        let execution_lanes = capabilities.len().max(1);
        // Analysis + execution lanes + integration.
        let subtask_count = execution_lanes + 2;
        let per_subtask_ms = (task.estimated_duration_ms / subtask_count as u64).max(1_000);

        let mut subtasks = Vec::with_capacity(subtask_count);

        let mut analysis = child_of(task, 0, per_subtask_ms);
        analysis.description = format!("analyze: {}", task.description);
        analysis.requirements.capabilities = Vec::new();
        let analysis_id = analysis.id.clone();
        subtasks.push(analysis);

        let mut execution_ids = Vec::with_capacity(execution_lanes);
        if capabilities.is_empty() {
            let mut execution = child_of(task, 1, per_subtask_ms);
            execution.description = format!("execute: {}", task.description);
            execution.dependencies = vec![analysis_id.clone()];
            execution.parallelizable = true;
            execution_ids.push(execution.id.clone());
            subtasks.push(execution);
        } else {
            for (i, capability) in capabilities.iter().enumerate() {
                let mut lane = child_of(task, (i + 1) as u32, per_subtask_ms);
                lane.description = format!("execute [{capability}]: {}", task.description);
                lane.requirements.capabilities = vec![capability.clone()];
                lane.dependencies = vec![analysis_id.clone()];
                lane.parallelizable = true;
                execution_ids.push(lane.id.clone());
                subtasks.push(lane);
            }
        }

        let mut integration = child_of(task, (execution_lanes + 1) as u32, per_subtask_ms);
        integration.description = format!("integrate: {}", task.description);
        integration.requirements.capabilities = Vec::new();
        integration.dependencies = execution_ids.clone();
        let integration_id = integration.id.clone();
        subtasks.push(integration);

        let plan = ExecutionPlan {
            strategy: if execution_ids.len() > 1 {
                ExecutionStrategy::Phased
            } else {
                ExecutionStrategy::Sequential
            },
            phases: vec![
                ExecutionPhase {
                    name: "analysis".to_string(),
                    subtask_ids: vec![analysis_id],
                },
                ExecutionPhase {
                    name: "execution".to_string(),
                    subtask_ids: execution_ids.clone(),
                },
                ExecutionPhase {
                    name: "integration".to_string(),
                    subtask_ids: vec![integration_id],
                },
            ],
            checkpoints: vec![
                Checkpoint {
                    after_phase: "analysis".to_string(),
                    description: "decomposition validated against requirements".to_string(),
                },
                Checkpoint {
                    after_phase: "execution".to_string(),
                    description: "all execution lanes reported results".to_string(),
                },
            ],
            rollback_steps: vec![
                "release reserved resources".to_string(),
                "discard intermediate artifacts".to_string(),
                "requeue parent task".to_string(),
            ],
        };

        let coordination = coordination_mode(task.complexity, execution_ids.len());

        debug!(
            parent_id = %task.id,
            subtasks = subtasks.len(),
            coordination = ?coordination,
            "task decomposed"
        );

        DecomposedTask {
            parent_id: task.id.clone(),
            subtasks,
            plan,
            coordination,
        }
    }
}

fn child_of(parent: &TaskDefinition, order: u32, estimated_duration_ms: u64) -> TaskDefinition {
    let mut child = parent.clone();
    child.id = Uuid::new_v4().to_string();
    child.parent_id = Some(parent.id.clone());
    child.order = Some(order);
    child.complexity = reduced_complexity(parent.complexity);
    child.estimated_duration_ms = estimated_duration_ms;
    child.dependencies = Vec::new();
    child.parallelizable = false;
    child
}

fn reduced_complexity(parent: TaskComplexity) -> TaskComplexity {
    match parent {
        TaskComplexity::Expert => TaskComplexity::Moderate,
        _ => TaskComplexity::Simple,
    }
}

fn coordination_mode(complexity: TaskComplexity, execution_lanes: usize) -> CoordinationMode {
    match complexity {
        TaskComplexity::Expert => CoordinationMode::Hierarchical,
        _ if execution_lanes >= 3 => CoordinationMode::Distributed,
        _ => CoordinationMode::Centralized,
    }
}
