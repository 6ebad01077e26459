//! Task registry: the steps registered for each task id.

use std::collections::HashMap;

use invo_runner::ExecuteImage;
use tracing::debug;

/// Ordered steps per task.
///
/// Steps are only ever appended. Task ids are listed in the order they were
/// first registered.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Vec<ExecuteImage>>,
    order: Vec<String>,
}

impl TaskRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to a task, returning its position within the task.
    pub fn append(&mut self, task: &str, step: ExecuteImage) -> usize {
        if !self.tasks.contains_key(task) {
            self.order.push(task.to_string());
        }
        let steps = self.tasks.entry(task.to_string()).or_default();
        steps.push(step);
        debug!(task = %task, step = steps.len(), "Registered step");
        steps.len() - 1
    }

    /// Get the steps of a task.
    pub fn steps(&self, task: &str) -> Option<&[ExecuteImage]> {
        self.tasks.get(task).map(Vec::as_slice)
    }

    /// Check if a task has any steps.
    pub fn contains(&self, task: &str) -> bool {
        self.tasks.contains_key(task)
    }

    /// Task ids in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Get the number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
