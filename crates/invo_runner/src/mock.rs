//! Mock container client for testing.
//!
//! Provides a configurable implementation of the ContainerClient trait for
//! use in tests without requiring a Docker daemon.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use parking_lot::RwLock;

use crate::client::{ContainerClient, ContainerStatus, LogChunk};
use crate::config::{ContainerConfig, HostConfig};
use crate::error::{RunnerError, RunnerResult};

/// Predefined outcome of a container run.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

/// Client operation, used to target simulated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Create,
    Start,
    Logs,
    Wait,
    Inspect,
    Remove,
}

impl MockOperation {
    fn method(&self) -> &'static str {
        match self {
            Self::Create => "create_container",
            Self::Start => "start_container",
            Self::Logs => "attach_logs",
            Self::Wait => "wait_container",
            Self::Inspect => "inspect_container",
            Self::Remove => "remove_container",
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub container_id: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub command: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub binds: Option<Vec<String>>,
}

impl CapturedCall {
    fn on(method: &str, container_id: &str) -> Self {
        Self {
            method: method.to_string(),
            container_id: Some(container_id.to_string()),
            name: None,
            image: None,
            command: None,
            working_dir: None,
            binds: None,
        }
    }
}

/// Mock container client for testing.
///
/// Every created container is assigned the next predefined response; the
/// response's output is replayed by `attach_logs` and its exit code returned
/// by `wait_container`.
#[derive(Clone, Default)]
pub struct MockClient {
    /// Predefined responses, consumed in order and cycled.
    responses: Arc<RwLock<Vec<MockResponse>>>,
    /// Index of next response to assign.
    response_index: Arc<AtomicUsize>,
    /// Response assigned to each created container.
    containers: Arc<RwLock<HashMap<String, MockResponse>>>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Containers that were started.
    started: Arc<RwLock<HashSet<String>>>,
    /// Containers that were removed.
    removed: Arc<RwLock<HashSet<String>>>,
    /// Counter for container ids.
    next_id: Arc<AtomicUsize>,
    /// Operations that fail, with the message to fail with.
    failures: Arc<RwLock<HashMap<MockOperation, String>>>,
}

impl MockClient {
    /// Create a new mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mock response for the next created container.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Make an operation fail with the given message.
    pub fn simulate_failure(self, operation: MockOperation, message: impl Into<String>) -> Self {
        self.failures.write().insert(operation, message.into());
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Ids of all containers created so far.
    pub fn created(&self) -> Vec<String> {
        self.get_method_calls("create_container")
            .into_iter()
            .filter_map(|c| c.container_id)
            .collect()
    }

    /// Whether a container was removed.
    pub fn is_removed(&self, container_id: &str) -> bool {
        self.removed.read().contains(container_id)
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn next_response(&self) -> MockResponse {
        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success("");
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses[index % responses.len()].clone()
    }

    fn check_failure(&self, operation: MockOperation, container_id: &str) -> RunnerResult<()> {
        match self.failures.read().get(&operation) {
            Some(message) => Err(RunnerError::ExecutionFailed(format!(
                "{} {}: {}",
                operation.method(),
                container_id,
                message
            ))),
            None => Ok(()),
        }
    }

    fn response_for(&self, container_id: &str) -> RunnerResult<MockResponse> {
        self.containers
            .read()
            .get(container_id)
            .cloned()
            .ok_or_else(|| RunnerError::ExecutionFailed(format!("no such container: {}", container_id)))
    }
}

#[async_trait]
impl ContainerClient for MockClient {
    async fn create_container(
        &self,
        name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
    ) -> RunnerResult<String> {
        let failure = self.check_failure(MockOperation::Create, name);
        let container_id = failure
            .is_ok()
            .then(|| format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.record_call(CapturedCall {
            method: "create_container".to_string(),
            container_id: container_id.clone(),
            name: Some(name.to_string()),
            image: Some(config.image.clone()),
            command: Some(config.command.clone()),
            working_dir: config.working_dir.clone(),
            binds: Some(host_config.binds.clone()),
        });
        failure?;
        let container_id = container_id.unwrap_or_default();

        let response = self.next_response();
        self.containers.write().insert(container_id.clone(), response);
        Ok(container_id)
    }

    async fn start_container(&self, container_id: &str) -> RunnerResult<()> {
        self.record_call(CapturedCall::on("start_container", container_id));
        self.check_failure(MockOperation::Start, container_id)?;
        self.response_for(container_id)?;
        self.started.write().insert(container_id.to_string());
        Ok(())
    }

    fn attach_logs<'a>(&'a self, container_id: &'a str) -> BoxStream<'a, RunnerResult<LogChunk>> {
        self.record_call(CapturedCall::on("attach_logs", container_id));
        if let Err(e) = self.check_failure(MockOperation::Logs, container_id) {
            return stream::once(async move { Err(e) }).boxed();
        }

        let response = match self.response_for(container_id) {
            Ok(response) => response,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let mut chunks: Vec<RunnerResult<LogChunk>> = Vec::new();
        chunks.extend(
            response
                .stdout
                .split_inclusive('\n')
                .map(|line| Ok(LogChunk::stdout(line))),
        );
        chunks.extend(
            response
                .stderr
                .split_inclusive('\n')
                .map(|line| Ok(LogChunk::stderr(line))),
        );
        stream::iter(chunks).boxed()
    }

    async fn wait_container(&self, container_id: &str) -> RunnerResult<i64> {
        self.record_call(CapturedCall::on("wait_container", container_id));
        self.check_failure(MockOperation::Wait, container_id)?;
        Ok(self.response_for(container_id)?.exit_code)
    }

    async fn inspect_container(&self, container_id: &str) -> RunnerResult<ContainerStatus> {
        self.record_call(CapturedCall::on("inspect_container", container_id));
        self.check_failure(MockOperation::Inspect, container_id)?;
        let response = self.response_for(container_id)?;

        if self.started.read().contains(container_id) {
            Ok(ContainerStatus {
                status: "exited".to_string(),
                running: false,
                exit_code: Some(response.exit_code),
            })
        } else {
            Ok(ContainerStatus {
                status: "created".to_string(),
                running: false,
                exit_code: None,
            })
        }
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> RunnerResult<()> {
        let mut call = CapturedCall::on("remove_container", container_id);
        call.command = Some(vec![format!("force={}", force)]);
        self.record_call(call);
        self.check_failure(MockOperation::Remove, container_id)?;
        self.response_for(container_id)?;
        self.removed.write().insert(container_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_replays_response() {
        let client = MockClient::new().add_response(MockResponse::success("line one\nline two\n"));

        let config = ContainerConfig::new("alpine").command(vec!["echo".into(), "hi".into()]);
        let id = client
            .create_container("invo-test", &config, &HostConfig::default())
            .await
            .unwrap();
        client.start_container(&id).await.unwrap();

        let chunks: Vec<_> = client.attach_logs(&id).collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap(), &LogChunk::stdout("line one\n"));
        assert_eq!(client.wait_container(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_client_captures_calls() {
        let client = MockClient::new();

        let config = ContainerConfig::new("golang")
            .working_dir("/src")
            .command(vec!["go".into(), "build".into()]);
        let host = HostConfig::default().bind("/work:/src");
        let id = client.create_container("invo-x", &config, &host).await.unwrap();

        let calls = client.get_method_calls("create_container");
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.container_id.as_deref(), Some(id.as_str()));
        assert_eq!(call.name.as_deref(), Some("invo-x"));
        assert_eq!(call.image.as_deref(), Some("golang"));
        assert_eq!(call.working_dir.as_deref(), Some("/src"));
        assert_eq!(call.binds.as_ref().unwrap(), &vec!["/work:/src".to_string()]);
        assert_eq!(client.created(), vec![id]);
    }

    #[tokio::test]
    async fn test_mock_client_failure_simulation() {
        let client = MockClient::new().simulate_failure(MockOperation::Start, "boom");
        let id = client
            .create_container("invo-y", &ContainerConfig::new("alpine"), &HostConfig::default())
            .await
            .unwrap();

        let err = client.start_container(&id).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(client.was_called("start_container"));
    }

    #[tokio::test]
    async fn test_mock_client_tracks_removal() {
        let client = MockClient::new();
        let id = client
            .create_container("invo-z", &ContainerConfig::new("alpine"), &HostConfig::default())
            .await
            .unwrap();

        assert!(!client.is_removed(&id));
        client.remove_container(&id, true).await.unwrap();
        assert!(client.is_removed(&id));
    }
}
