//! Task runner: executes the steps registered for a task, in order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use invo_runner::{ContainerClient, LogHandler};
use serde::Serialize;
use tracing::{error, info};

use crate::context::InvocationContext;
use crate::error::{CoreError, CoreResult};

/// Outcome of one executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// 1-based position within the task
    pub step: usize,
    /// Short description, e.g. `alpine: echo hi`
    pub description: String,
    pub container_id: String,
    pub exit_code: i64,
    /// Whether the container was removed afterwards
    pub removed: bool,
    pub duration_ms: u64,
}

/// Outcome of a task whose steps all matched their expectations.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Runs tasks against a container client.
pub struct TaskRunner {
    client: Arc<dyn ContainerClient>,
    log_handler: Option<LogHandler>,
}

impl TaskRunner {
    pub fn new(client: Arc<dyn ContainerClient>) -> Self {
        Self {
            client,
            log_handler: None,
        }
    }

    /// Receive container output line by line while steps run.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Run every step of `task`.
    ///
    /// Stops at the first step that fails; later steps of the task are not
    /// started.
    pub async fn run_task(&self, ctx: &InvocationContext, task: &str) -> CoreResult<TaskReport> {
        let steps = ctx.steps(task)?;
        let started_at = Utc::now();
        let total = steps.len();
        let mut reports = Vec::with_capacity(total);

        info!(task = %task, steps = total, "Running task");

        for (i, step) in steps.iter().enumerate() {
            let number = i + 1;
            info!(task = %task, "Executing step [{}/{}]: {}", number, total, step.describe());

            let result = match step.execute_with(self.client.as_ref(), self.log_handler.clone()).await {
                Ok(result) => result,
                Err(e) => {
                    error!(task = %task, step = number, error = %e, "Step failed");
                    return Err(CoreError::StepFailed {
                        task: task.to_string(),
                        step: number,
                        source: e,
                    });
                }
            };

            reports.push(StepReport {
                step: number,
                description: step.describe(),
                container_id: result.container_id,
                exit_code: result.exit_code,
                removed: result.removed,
                duration_ms: result.duration_ms,
            });
        }

        let report = TaskReport {
            task: task.to_string(),
            steps: reports,
            started_at,
            finished_at: Utc::now(),
        };
        info!(task = %task, duration_ms = report.duration_ms(), "Task complete");
        Ok(report)
    }

    /// Run several tasks in the given order, stopping at the first failure.
    ///
    /// All ids are checked before anything runs, so a typo in the last id
    /// does not leave the earlier tasks half done.
    pub async fn run_tasks<S: AsRef<str>>(
        &self,
        ctx: &InvocationContext,
        tasks: &[S],
    ) -> CoreResult<Vec<TaskReport>> {
        let registry = ctx.registry();
        if let Some(missing) = tasks.iter().map(AsRef::as_ref).find(|t| !registry.contains(t)) {
            return Err(CoreError::TaskNotFound(missing.to_string()));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            reports.push(self.run_task(ctx, task.as_ref()).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderState;
    use invo_runner::{ExpectationSpec, MockClient, MockResponse, RunnerError};

    fn runner(client: &MockClient) -> TaskRunner {
        TaskRunner::new(Arc::new(client.clone()))
    }

    #[tokio::test]
    async fn test_run_task_in_order() {
        let ctx = InvocationContext::new("/work");
        let using = BuilderState::new(ctx.clone()).task("build").unwrap().using("alpine").unwrap();
        using.run(["echo", "one"]).unwrap();
        using.run(["echo", "two"]).unwrap();

        let client = MockClient::new();
        let report = runner(&client).run_task(&ctx, "build").await.unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].description, "alpine: echo one");
        assert_eq!(report.steps[1].step, 2);

        let commands: Vec<_> = client
            .get_method_calls("create_container")
            .into_iter()
            .filter_map(|c| c.command)
            .collect();
        assert_eq!(
            commands,
            vec![
                vec!["echo".to_string(), "one".to_string()],
                vec!["echo".to_string(), "two".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_run_task_stops_at_first_failure() {
        let ctx = InvocationContext::new("/work");
        let using = BuilderState::new(ctx.clone()).using("alpine").unwrap();
        using.run(["false"]).unwrap();
        using.run(["echo", "never"]).unwrap();

        let client = MockClient::new().add_response(MockResponse::failure(1, ""));
        let err = runner(&client).run_task(&ctx, "default").await.unwrap_err();

        match err {
            CoreError::StepFailed { task, step, source } => {
                assert_eq!(task, "default");
                assert_eq!(step, 1);
                assert!(matches!(source, RunnerError::UnexpectedExitCode { .. }));
            }
            other => panic!("expected StepFailed, got {:?}", other),
        }
        assert_eq!(client.get_method_calls("create_container").len(), 1);
    }

    #[tokio::test]
    async fn test_expected_code_is_not_a_failure() {
        let ctx = InvocationContext::new("/work");
        BuilderState::new(ctx.clone())
            .using("alpine")
            .unwrap()
            .with_expectation(&ExpectationSpec::default().code(1))
            .unwrap()
            .run(["false"])
            .unwrap();

        let client = MockClient::new().add_response(MockResponse::failure(1, ""));
        let report = runner(&client).run_task(&ctx, "default").await.unwrap();
        assert_eq!(report.steps[0].exit_code, 1);
        assert!(!report.steps[0].removed);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let ctx = InvocationContext::new("/work");
        let client = MockClient::new();
        let err = runner(&client).run_task(&ctx, "nope").await.unwrap_err();
        assert!(matches!(err, CoreError::TaskNotFound(ref t) if t == "nope"));
    }

    #[tokio::test]
    async fn test_run_tasks_checks_ids_first() {
        let ctx = InvocationContext::new("/work");
        BuilderState::new(ctx.clone())
            .task("build")
            .unwrap()
            .using("alpine")
            .unwrap()
            .run(["make"])
            .unwrap();

        let client = MockClient::new();
        let err = runner(&client)
            .run_tasks(&ctx, &["build", "missing"])
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::TaskNotFound(ref t) if t == "missing"));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_tasks_in_given_order() {
        let ctx = InvocationContext::new("/work");
        let root = BuilderState::new(ctx.clone());
        root.task("a").unwrap().using("alpine").unwrap().run(["echo", "a"]).unwrap();
        root.task("b").unwrap().using("busybox").unwrap().run(["echo", "b"]).unwrap();

        let client = MockClient::new();
        let reports = runner(&client).run_tasks(&ctx, &["b", "a"]).await.unwrap();

        let names: Vec<_> = reports.iter().map(|r| r.task.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        let images: Vec<_> = client
            .get_method_calls("create_container")
            .into_iter()
            .filter_map(|c| c.image)
            .collect();
        assert_eq!(images, vec!["busybox", "alpine"]);
    }
}
