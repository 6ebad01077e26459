//! Error types for the core module.

use thiserror::Error;

use invo_runner::RunnerError;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or running tasks.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),

    #[error("Invalid image reference: {0:?}")]
    InvalidImage(String),

    #[error("Task '{task}' failed at step {step}: {source}")]
    StepFailed {
        task: String,
        step: usize,
        #[source]
        source: RunnerError,
    },

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

impl CoreError {
    /// Whether the error was caused by the build description rather than by
    /// running a container.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::InvalidTaskId(_) | Self::InvalidImage(_) => true,
            Self::Runner(e) => e.is_configuration(),
            Self::TaskNotFound(_) | Self::StepFailed { .. } => false,
        }
    }
}
