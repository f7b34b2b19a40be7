//! Task definitions, decomposition artifacts and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduling priority of a task. Weights drive the queue bands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    /// Static weight table: critical=5, high=4, normal=3, low=1.
    pub fn weight(&self) -> u8 {
        match self {
            TaskPriority::Critical => 5,
            TaskPriority::High => 4,
            TaskPriority::Normal => 3,
            TaskPriority::Low => 1,
        }
    }

    /// All priorities, heaviest first. Drain order for the task queue.
    pub const DESCENDING: [TaskPriority; 4] = [
        TaskPriority::Critical,
        TaskPriority::High,
        TaskPriority::Normal,
        TaskPriority::Low,
    ];
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
    Trivial,
    #[default]
    Simple,
    Moderate,
    Complex,
    Expert,
}

impl TaskComplexity {
    /// Complex and expert tasks are always decomposed before queueing.
    pub fn requires_decomposition(&self) -> bool {
        matches!(self, TaskComplexity::Complex | TaskComplexity::Expert)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IsolationLevel {
    #[default]
    Shared,
    Sandboxed,
    Isolated,
}

/// What a task needs from the agent that runs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequirements {
    pub capabilities: Vec<String>,
    pub cpu: f64,
    pub memory_mb: u64,
    /// Minimum acceptable result quality in [0, 1].
    pub min_quality: f64,
}

impl Default for TaskRequirements {
    fn default() -> Self {
        Self {
            capabilities: Vec::new(),
            cpu: 1.0,
            memory_mb: 256,
            min_quality: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConstraints {
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub isolation: IsolationLevel,
}

impl Default for TaskConstraints {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 300_000,
            isolation: IsolationLevel::Shared,
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Queued,
    Assigned,
    Completed,
    Failed,
    Cancelled,
}

/// A unit of schedulable work.
///
/// Subtasks produced by decomposition are ordinary definitions carrying
/// `parent_id`/`order` metadata and dependency edges onto their siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub description: String,
    pub priority: TaskPriority,
    pub complexity: TaskComplexity,
    #[serde(default)]
    pub requirements: TaskRequirements,
    #[serde(default)]
    pub constraints: TaskConstraints,
    /// Task IDs that must complete before this one may be assigned.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub estimated_duration_ms: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub parallelizable: bool,
}

impl TaskDefinition {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            priority: TaskPriority::Normal,
            complexity: TaskComplexity::Simple,
            requirements: TaskRequirements::default(),
            constraints: TaskConstraints::default(),
            dependencies: Vec::new(),
            estimated_duration_ms: 60_000,
            created_at: Utc::now(),
            parent_id: None,
            order: None,
            parallelizable: false,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_complexity(mut self, complexity: TaskComplexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.requirements.capabilities = capabilities;
        self
    }
}

/// How decomposed subtasks coordinate their execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationMode {
    Centralized,
    Distributed,
    Hierarchical,
    #[serde(rename = "peer-to-peer")]
    PeerToPeer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    Sequential,
    Parallel,
    Phased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPhase {
    pub name: String,
    pub subtask_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub after_phase: String,
    pub description: String,
}

/// Plan attached to a decomposed task: phase ordering, checkpoints after
/// each phase and the rollback steps to unwind a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub strategy: ExecutionStrategy,
    pub phases: Vec<ExecutionPhase>,
    pub checkpoints: Vec<Checkpoint>,
    pub rollback_steps: Vec<String>,
}

/// Result of decomposing a complex/expert task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposedTask {
    pub parent_id: String,
    pub subtasks: Vec<TaskDefinition>,
    pub plan: ExecutionPlan,
    pub coordination: CoordinationMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_table() {
        assert_eq!(TaskPriority::Critical.weight(), 5);
        assert_eq!(TaskPriority::High.weight(), 4);
        assert_eq!(TaskPriority::Normal.weight(), 3);
        assert_eq!(TaskPriority::Low.weight(), 1);
    }

    #[test]
    fn test_decomposition_gate() {
        assert!(!TaskComplexity::Simple.requires_decomposition());
        assert!(!TaskComplexity::Moderate.requires_decomposition());
        assert!(TaskComplexity::Complex.requires_decomposition());
        assert!(TaskComplexity::Expert.requires_decomposition());
    }

    #[test]
    fn test_definition_defaults() {
        let task = TaskDefinition::new("index the corpus");
        assert_eq!(task.priority, TaskPriority::Normal);
        assert_eq!(task.complexity, TaskComplexity::Simple);
        assert_eq!(task.constraints.max_retries, 3);
        assert!(task.parent_id.is_none());
        assert!(task.dependencies.is_empty());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let task = TaskDefinition::new("summarize")
            .with_priority(TaskPriority::Critical)
            .with_complexity(TaskComplexity::Expert)
            .with_capabilities(vec!["nlp".into()]);
        let json = serde_json::to_string(&task).unwrap();
        let restored: TaskDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.priority, TaskPriority::Critical);
        assert_eq!(restored.complexity, TaskComplexity::Expert);
        assert_eq!(restored.requirements.capabilities, vec!["nlp"]);
    }
}
