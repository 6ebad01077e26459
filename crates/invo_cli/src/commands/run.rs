//! Run command - Execute tasks from the control file.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use invo_core::{CoreError, TaskRunner};
use invo_runner::{LogHandler, LogLine, LogStream};

use super::GlobalArgs;

#[derive(Args)]
pub struct RunArgs {
    /// Tasks to run, in order
    #[arg(required = true, value_name = "TASK")]
    tasks: Vec<String>,

    /// Print a JSON report of the executed steps
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = global.load_context()?;

    // Unknown task ids fail before the daemon is contacted.
    let registry = ctx.registry();
    if let Some(missing) = args.tasks.iter().find(|t| !registry.contains(t)) {
        return Err(CoreError::TaskNotFound(missing.clone()).into());
    }

    let client = global.docker_client().await?;

    let handler: LogHandler = Arc::new(print_line);
    let runner = TaskRunner::new(Arc::new(client)).with_log_handler(handler);

    let reports = runner.run_tasks(&ctx, args.tasks.as_slice()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            info!(
                task = %report.task,
                steps = report.steps.len(),
                duration_ms = report.duration_ms(),
                "Task succeeded"
            );
        }
    }

    Ok(())
}

/// Forward container output to the matching stream of this process.
fn print_line(line: LogLine) {
    match line.stream {
        LogStream::Stdout => println!("{}", line.message),
        LogStream::Stderr => eprintln!("{}", line.message),
    }
}
