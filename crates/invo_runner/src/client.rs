//! Container engine capability used by the execution engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::{ContainerConfig, HostConfig};
use crate::error::RunnerResult;

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// A piece of container output as delivered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub stream: LogStream,
    pub message: String,
}

impl LogChunk {
    pub fn stdout(message: impl Into<String>) -> Self {
        Self {
            stream: LogStream::Stdout,
            message: message.into(),
        }
    }

    pub fn stderr(message: impl Into<String>) -> Self {
        Self {
            stream: LogStream::Stderr,
            message: message.into(),
        }
    }
}

/// A single line of container output, handed to a [`LogHandler`].
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub container_id: String,
    pub stream: LogStream,
    pub message: String,
}

/// Log handler callback type.
pub type LogHandler = Arc<dyn Fn(LogLine) + Send + Sync>;

/// Container state as reported by inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub status: String,
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// Operations the execution engine needs from a container engine.
///
/// Every operation is keyed by the id returned from `create_container`.
#[async_trait]
pub trait ContainerClient: Send + Sync {
    /// Create a container, returning its id.
    async fn create_container(
        &self,
        name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
    ) -> RunnerResult<String>;

    /// Start a created container.
    async fn start_container(&self, container_id: &str) -> RunnerResult<()>;

    /// Follow the output of a container until it exits.
    fn attach_logs<'a>(&'a self, container_id: &'a str) -> BoxStream<'a, RunnerResult<LogChunk>>;

    /// Block until the container exits, returning its exit code.
    async fn wait_container(&self, container_id: &str) -> RunnerResult<i64>;

    /// Report the current state of a container.
    async fn inspect_container(&self, container_id: &str) -> RunnerResult<ContainerStatus>;

    /// Remove a container.
    async fn remove_container(&self, container_id: &str, force: bool) -> RunnerResult<()>;
}
