//! Execution of a single step: one container, run to completion.
//!
//! The container is removed only when it exited with code 0 and that was
//! the expected code. Every other outcome leaves it in place so it can be
//! inspected with `docker logs` / `docker inspect`.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::{ContainerClient, LogHandler, LogLine, LogStream};
use crate::config::{ContainerConfig, HostConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::expectation::{Expectation, Verdict};

/// Result of a step whose outcome matched its expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Container ID
    pub container_id: String,
    /// Exit code from the container
    pub exit_code: i64,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Whether the container was removed afterwards
    pub removed: bool,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// A fully configured step, similar to `docker run`.
#[derive(Debug, Clone, Default)]
pub struct ExecuteImage {
    pub config: ContainerConfig,
    pub host_config: HostConfig,
    pub expectation: Expectation,
}

impl ExecuteImage {
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn host_config(mut self, host_config: HostConfig) -> Self {
        self.host_config = host_config;
        self
    }

    pub fn expectation(mut self, expectation: Expectation) -> Self {
        self.expectation = expectation;
        self
    }

    /// Short human readable form, e.g. `alpine: echo hi`.
    pub fn describe(&self) -> String {
        if self.config.command.is_empty() {
            self.config.image.clone()
        } else {
            format!("{}: {}", self.config.image, self.config.command.join(" "))
        }
    }

    /// Run the step.
    pub async fn execute(&self, client: &dyn ContainerClient) -> RunnerResult<ExecutionResult> {
        self.execute_with(client, None).await
    }

    /// Run the step, handing every line of output to `log_handler` as it
    /// arrives.
    pub async fn execute_with(
        &self,
        client: &dyn ContainerClient,
        log_handler: Option<LogHandler>,
    ) -> RunnerResult<ExecutionResult> {
        let name = generate_container_name();
        let started_at = Utc::now();

        let container_id = client
            .create_container(&name, &self.config, &self.host_config)
            .await
            .map_err(|e| RunnerError::CreateFailed {
                image: self.config.image.clone(),
                message: e.to_string(),
            })?;

        debug!(container_id = %container_id, name = %name, "Container created, starting it");

        if let Err(e) = client.start_container(&container_id).await {
            warn!(container_id = %container_id, error = %e, "Container not started and not removed");
            log_state(client, &container_id).await;
            return Err(RunnerError::StartFailed {
                container_id,
                message: e.to_string(),
            });
        }

        debug!(container_id = %container_id, "Container started, await completion");

        let (logs, exit) = tokio::join!(
            collect_logs(client, &container_id, log_handler.as_ref()),
            client.wait_container(&container_id),
        );

        let (stdout, stderr) = logs.map_err(|e| RunnerError::LogsFailed {
            container_id: container_id.clone(),
            message: e.to_string(),
        })?;

        let exit_code = exit.map_err(|e| match e {
            RunnerError::WaitFailed { .. } => e,
            other => RunnerError::WaitFailed {
                container_id: container_id.clone(),
                message: other.to_string(),
            },
        })?;

        let expected = self.expectation.code();
        if exit_code != expected {
            error!(
                container_id = %container_id,
                expected,
                actual = exit_code,
                "Unexpected exit code, container not removed"
            );
            return Err(RunnerError::UnexpectedExitCode {
                container_id,
                expected,
                actual: exit_code,
            });
        }

        info!(container_id = %container_id, status = exit_code, "Execution complete");

        // Removal depends on the exit code only; output patterns are checked
        // afterwards and do not keep the container around.
        let removed = if exit_code == 0 {
            remove(client, &container_id).await
        } else {
            debug!(container_id = %container_id, "Non-zero exit code was expected, container not removed");
            false
        };

        if let Verdict::Output { stream, pattern } = self.expectation.check_output(&stdout, &stderr) {
            error!(
                container_id = %container_id,
                stream = %stream,
                pattern = %pattern,
                "Unexpected output"
            );
            return Err(RunnerError::UnexpectedOutput {
                container_id,
                stream,
                pattern,
            });
        }

        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        Ok(ExecutionResult {
            container_id,
            exit_code,
            stdout,
            stderr,
            removed,
            started_at,
            finished_at,
            duration_ms,
        })
    }
}

fn generate_container_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("invo-{}", &id[..8])
}

/// Drain the container's log stream, keeping stdout and stderr apart.
///
/// Engine frames need not end on a line boundary, so each stream keeps its
/// partial line until the rest arrives or the stream ends.
async fn collect_logs(
    client: &dyn ContainerClient,
    container_id: &str,
    log_handler: Option<&LogHandler>,
) -> RunnerResult<(String, String)> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut stdout_lines = LineBuffer::default();
    let mut stderr_lines = LineBuffer::default();

    let mut stream = client.attach_logs(container_id);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;

        let (text, lines) = match chunk.stream {
            LogStream::Stdout => (&mut stdout, &mut stdout_lines),
            LogStream::Stderr => (&mut stderr, &mut stderr_lines),
        };
        text.push_str(&chunk.message);
        for line in lines.push(&chunk.message) {
            emit_line(container_id, chunk.stream, line, log_handler);
        }
    }

    for (stream, lines) in [
        (LogStream::Stdout, &mut stdout_lines),
        (LogStream::Stderr, &mut stderr_lines),
    ] {
        if let Some(line) = lines.finish() {
            emit_line(container_id, stream, line, log_handler);
        }
    }

    Ok((stdout, stderr))
}

fn emit_line(
    container_id: &str,
    stream: LogStream,
    message: String,
    log_handler: Option<&LogHandler>,
) {
    debug!(container_id = %container_id, stream = %stream, "{}", message);
    if let Some(handler) = log_handler {
        handler(LogLine {
            timestamp: Utc::now(),
            container_id: container_id.to_string(),
            stream,
            message,
        });
    }
}

/// Reassembles lines from arbitrarily split text.
#[derive(Debug, Default)]
struct LineBuffer {
    partial: String,
}

impl LineBuffer {
    /// Append `text`, returning every line it completes without the line ending.
    fn push(&mut self, text: &str) -> Vec<String> {
        self.partial.push_str(text);
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            lines.push(line.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string());
        }
        lines
    }

    /// The unterminated remainder, if any.
    fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}

async fn remove(client: &dyn ContainerClient, container_id: &str) -> bool {
    match client.remove_container(container_id, true).await {
        Ok(()) => {
            debug!(container_id = %container_id, "Container removed");
            true
        }
        Err(e) => {
            let err = RunnerError::RemoveFailed {
                container_id: container_id.to_string(),
                message: e.to_string(),
            };
            warn!(container_id = %container_id, error = %err, "Container not removed");
            false
        }
    }
}

async fn log_state(client: &dyn ContainerClient, container_id: &str) {
    match client.inspect_container(container_id).await {
        Ok(state) => debug!(
            container_id = %container_id,
            status = %state.status,
            "Container left for inspection"
        ),
        Err(e) => {
            let err = RunnerError::InspectFailed {
                container_id: container_id.to_string(),
                message: e.to_string(),
            };
            debug!(container_id = %container_id, error = %err, "Container state unknown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::ExpectationSpec;
    use crate::mock::{MockClient, MockOperation, MockResponse};

    fn step(command: &[&str]) -> ExecuteImage {
        ExecuteImage::new(
            ContainerConfig::new("alpine").command(command.iter().map(|s| s.to_string()).collect()),
        )
    }

    #[test]
    fn test_container_names() {
        let a = generate_container_name();
        let b = generate_container_name();
        assert!(a.starts_with("invo-"));
        assert_eq!(a.len(), "invo-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_describe() {
        assert_eq!(step(&["echo", "hi"]).describe(), "alpine: echo hi");
        assert_eq!(step(&[]).describe(), "alpine");
    }

    #[tokio::test]
    async fn test_output_is_split_by_stream() {
        let client = MockClient::new().add_response(
            MockResponse::success("out 1\nout 2\n").with_stderr("err 1\n"),
        );

        let result = step(&["make"]).execute(&client).await.unwrap();
        assert_eq!(result.stdout, "out 1\nout 2\n");
        assert_eq!(result.stderr, "err 1\n");
        assert!(result.combined_output().contains("err 1"));
    }

    #[tokio::test]
    async fn test_log_handler_sees_every_line() {
        let client = MockClient::new()
            .add_response(MockResponse::success("a\nb\n").with_stderr("c\n"));
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: LogHandler = std::sync::Arc::new(move |line: LogLine| {
            sink.lock().push((line.stream, line.message));
        });

        step(&["make"]).execute_with(&client, Some(handler)).await.unwrap();

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                (LogStream::Stdout, "a".to_string()),
                (LogStream::Stdout, "b".to_string()),
                (LogStream::Stderr, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_line_buffer_joins_split_frames() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push("hel").is_empty());
        assert_eq!(buffer.push("lo\r\nwor"), vec!["hello".to_string()]);
        assert_eq!(buffer.push("ld\n\nend"), vec!["world".to_string(), String::new()]);
        assert_eq!(buffer.finish(), Some("end".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[tokio::test]
    async fn test_log_handler_sees_unterminated_last_line() {
        let client = MockClient::new().add_response(MockResponse::success("first\nlast"));
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: LogHandler = std::sync::Arc::new(move |line: LogLine| {
            sink.lock().push(line.message);
        });

        let result = step(&["printf"]).execute_with(&client, Some(handler)).await.unwrap();

        assert_eq!(result.stdout, "first\nlast");
        assert_eq!(*seen.lock(), vec!["first".to_string(), "last".to_string()]);
    }

    #[tokio::test]
    async fn test_stderr_pattern_mismatch() {
        let client = MockClient::new().add_response(MockResponse::success("").with_stderr("fine"));
        let expectation =
            Expectation::from_spec(&ExpectationSpec::default().stderr("warning")).unwrap();

        let err = step(&["lint"])
            .expectation(expectation)
            .execute(&client)
            .await
            .unwrap_err();
        match err {
            RunnerError::UnexpectedOutput { stream, pattern, .. } => {
                assert_eq!(stream, LogStream::Stderr);
                assert_eq!(pattern, "warning");
            }
            other => panic!("expected UnexpectedOutput, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inspect_failure_does_not_mask_start_failure() {
        let client = MockClient::new()
            .simulate_failure(MockOperation::Start, "no such image")
            .simulate_failure(MockOperation::Inspect, "gone");

        let err = step(&["true"]).execute(&client).await.unwrap_err();
        assert!(matches!(err, RunnerError::StartFailed { .. }));
    }
}
