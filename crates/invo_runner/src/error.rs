//! Error types for the runner module.

use thiserror::Error;

use crate::client::LogStream;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while configuring or executing a step.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Invalid bind '{bind}', has to be of the form: source:dest")]
    InvalidBind { bind: String },

    #[error("invalid regular expression in {stream}: {source}")]
    InvalidPattern {
        stream: LogStream,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Docker not available: {0}")]
    DockerNotAvailable(String),

    #[error("Container for image {image} not created: {message}")]
    CreateFailed { image: String, message: String },

    #[error("Container {container_id} not started and not removed: {message}")]
    StartFailed {
        container_id: String,
        message: String,
    },

    #[error("Attaching logs of container {container_id} failed: {message}")]
    LogsFailed {
        container_id: String,
        message: String,
    },

    #[error("Waiting for container {container_id} failed: {message}")]
    WaitFailed {
        container_id: String,
        message: String,
    },

    #[error("Inspecting container {container_id} failed: {message}")]
    InspectFailed {
        container_id: String,
        message: String,
    },

    #[error("Removing container {container_id} failed: {message}")]
    RemoveFailed {
        container_id: String,
        message: String,
    },

    #[error("Unexpected exit code in container {container_id}: expected {expected}, got {actual}")]
    UnexpectedExitCode {
        container_id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Unexpected {stream} in container {container_id}: no match for /{pattern}/")]
    UnexpectedOutput {
        container_id: String,
        stream: LogStream,
        pattern: String,
    },

    #[error("Container operation failed: {0}")]
    ExecutionFailed(String),

    #[error("Image pull failed: {0}")]
    ImagePullFailed(String),

    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),
}

impl RunnerError {
    /// Whether the container ran to completion but the outcome did not match
    /// the expectation, as opposed to a configuration or runtime failure.
    pub fn is_verdict(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedExitCode { .. } | Self::UnexpectedOutput { .. }
        )
    }

    /// Whether the error stems from the step's configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidBind { .. } | Self::InvalidPattern { .. })
    }

    /// The container the error refers to, if one was created.
    pub fn container_id(&self) -> Option<&str> {
        match self {
            Self::StartFailed { container_id, .. }
            | Self::LogsFailed { container_id, .. }
            | Self::WaitFailed { container_id, .. }
            | Self::InspectFailed { container_id, .. }
            | Self::RemoveFailed { container_id, .. }
            | Self::UnexpectedExitCode { container_id, .. }
            | Self::UnexpectedOutput { container_id, .. } => Some(container_id),
            _ => None,
        }
    }
}
