//! Priority task queue.
//!
//! One FIFO band per priority weight. Draining is strict: a band is only
//! served once every heavier band is empty. Within a band, submission
//! order (a monotonic sequence stamped on push) breaks ties
//! deterministically.

use std::collections::VecDeque;

use tracing::debug;

use swarmbus_protocol::{TaskDefinition, TaskPriority};

fn band(priority: TaskPriority) -> usize {
    match priority {
        TaskPriority::Critical => 0,
        TaskPriority::High => 1,
        TaskPriority::Normal => 2,
        TaskPriority::Low => 3,
    }
}

#[derive(Debug, Clone)]
struct QueuedTask {
    task: TaskDefinition,
    seq: u64,
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    bands: [VecDeque<QueuedTask>; 4],
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task into its priority band.
    pub fn push(&mut self, task: TaskDefinition) {
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(task_id = %task.id, priority = ?task.priority, seq, "task queued");
        self.bands[band(task.priority)].push_back(QueuedTask { task, seq });
    }

    /// Pop up to `k` tasks in strict priority order, FIFO within a band.
    pub fn get_next(&mut self, k: usize) -> Vec<TaskDefinition> {
        self.get_next_where(k, |_| true)
    }

    /// Pop up to `k` tasks for which `ready` holds, preserving the queue
    /// position of everything skipped.
    pub fn get_next_where(
        &mut self,
        k: usize,
        ready: impl Fn(&TaskDefinition) -> bool,
    ) -> Vec<TaskDefinition> {
        let mut out = Vec::new();
        for queue in &mut self.bands {
            if out.len() >= k {
                break;
            }
            let mut kept = VecDeque::with_capacity(queue.len());
            while let Some(entry) = queue.pop_front() {
                if out.len() < k && ready(&entry.task) {
                    out.push(entry.task);
                } else {
                    kept.push_back(entry);
                }
            }
            *queue = kept;
        }
        out
    }

    /// Remove a task wherever it is queued.
    pub fn remove(&mut self, task_id: &str) -> Option<TaskDefinition> {
        for queue in &mut self.bands {
            if let Some(pos) = queue.iter().position(|e| e.task.id == task_id) {
                return queue.remove(pos).map(|e| e.task);
            }
        }
        None
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.bands
            .iter()
            .any(|q| q.iter().any(|e| e.task.id == task_id))
    }

    pub fn len(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Task IDs in drain order, for status snapshots.
    pub fn pending_ids(&self) -> Vec<String> {
        self.bands
            .iter()
            .flat_map(|q| q.iter().map(|e| e.task.id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: TaskPriority) -> TaskDefinition {
        let mut t = TaskDefinition::new(id).with_priority(priority);
        t.id = id.to_string();
        t
    }

    #[test]
    fn test_strict_priority_drain() {
        let mut queue = TaskQueue::new();
        queue.push(task("low", TaskPriority::Low));
        queue.push(task("critical", TaskPriority::Critical));
        queue.push(task("normal", TaskPriority::Normal));

        let drained: Vec<String> = queue.get_next(10).into_iter().map(|t| t.id).collect();
        assert_eq!(drained, vec!["critical", "normal", "low"]);
    }

    #[test]
    fn test_fifo_within_band() {
        let mut queue = TaskQueue::new();
        queue.push(task("first", TaskPriority::Normal));
        queue.push(task("second", TaskPriority::Normal));
        queue.push(task("third", TaskPriority::Normal));

        let drained: Vec<String> = queue.get_next(2).into_iter().map(|t| t.id).collect();
        assert_eq!(drained, vec!["first", "second"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_skipped_tasks_keep_position() {
        let mut queue = TaskQueue::new();
        queue.push(task("blocked", TaskPriority::Normal));
        queue.push(task("ready-1", TaskPriority::Normal));
        queue.push(task("ready-2", TaskPriority::Normal));

        let drained: Vec<String> = queue
            .get_next_where(10, |t| t.id != "blocked")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(drained, vec!["ready-1", "ready-2"]);
        assert_eq!(queue.pending_ids(), vec!["blocked"]);
    }

    #[test]
    fn test_remove() {
        let mut queue = TaskQueue::new();
        queue.push(task("a", TaskPriority::Normal));
        queue.push(task("b", TaskPriority::Low));

        assert!(queue.remove("b").is_some());
        assert!(queue.remove("b").is_none());
        assert_eq!(queue.len(), 1);
    }
}
