//! Invocation context shared by every builder snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use invo_runner::ExecuteImage;
use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::registry::TaskRegistry;

/// The directory invo runs in and the registry the build description fills.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    working_dir: PathBuf,
    tasks: Arc<RwLock<TaskRegistry>>,
}

impl InvocationContext {
    /// Create a context with an empty registry. `working_dir` should be
    /// absolute; relative bind sources are resolved against it.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            tasks: Arc::new(RwLock::new(TaskRegistry::new())),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Append a step to a task, returning its position within the task.
    pub fn register(&self, task: &str, step: ExecuteImage) -> usize {
        self.tasks.write().append(task, step)
    }

    /// Copy of the steps of a task.
    pub fn steps(&self, task: &str) -> CoreResult<Vec<ExecuteImage>> {
        self.tasks
            .read()
            .steps(task)
            .map(<[ExecuteImage]>::to_vec)
            .ok_or_else(|| CoreError::TaskNotFound(task.to_string()))
    }

    /// Task ids with their step count, in registration order.
    pub fn summary(&self) -> Vec<(String, usize)> {
        let tasks = self.tasks.read();
        tasks
            .ids()
            .into_iter()
            .map(|id| (id.to_string(), tasks.steps(id).map_or(0, <[ExecuteImage]>::len)))
            .collect()
    }

    /// Copy of the whole registry.
    pub fn registry(&self) -> TaskRegistry {
        self.tasks.read().clone()
    }
}
