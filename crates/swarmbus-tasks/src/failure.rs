//! Retry budgets and stuck-task detection.

use chrono::{DateTime, Utc};
use tracing::warn;

use swarmbus_protocol::{TaskAssignment, TaskDefinition, STUCK_TASK_MULTIPLIER};

/// What to do with a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Budget remains; requeue the task.
    Retry { remaining: u32 },
    /// Budget exhausted; the failure is permanent.
    Permanent,
}

pub struct FailureHandler {
    stuck_multiplier: f64,
}

impl FailureHandler {
    pub fn new() -> Self {
        Self {
            stuck_multiplier: STUCK_TASK_MULTIPLIER,
        }
    }

    /// Decide retry vs permanent failure. `failed_attempts` counts the
    /// attempt that just failed: a task with max_retries=1 retries after
    /// its first failure and goes permanent on the second.
    pub fn disposition(&self, task: &TaskDefinition, failed_attempts: u32) -> FailureDisposition {
        if failed_attempts <= task.constraints.max_retries {
            FailureDisposition::Retry {
                remaining: task.constraints.max_retries - failed_attempts,
            }
        } else {
            warn!(
                task_id = %task.id,
                failed_attempts,
                max_retries = task.constraints.max_retries,
                "retry budget exhausted"
            );
            FailureDisposition::Permanent
        }
    }

    /// Whether an in-flight assignment has been running past the stuck
    /// threshold (2x the task's estimate).
    pub fn is_stuck(
        &self,
        assignment: &TaskAssignment,
        task: &TaskDefinition,
        now: DateTime<Utc>,
    ) -> bool {
        let running_ms = now
            .signed_duration_since(assignment.assigned_at)
            .num_milliseconds();
        running_ms as f64 > task.estimated_duration_ms as f64 * self.stuck_multiplier
    }
}

impl Default for FailureHandler {
    fn default() -> Self {
        Self::new()
    }
}
