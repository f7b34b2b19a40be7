//! Task-distribution errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("task not found: {0}")]
    NotFound(String),

    /// No agent passed the eligibility gate. The caller requeues the task
    /// rather than failing it.
    #[error("no eligible agent for task {task_id}: {candidates} candidates, {capable} capable, {with_headroom} with headroom")]
    NoEligibleAgent {
        task_id: String,
        candidates: usize,
        capable: usize,
        with_headroom: usize,
    },

    #[error("retry budget exhausted for task {0}")]
    RetryExhausted(String),
}
