//! CLI command definitions.
//!
//! Both subcommands start by evaluating the control file; `run` then
//! executes tasks against the Docker daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use invo_core::InvocationContext;
use invo_runner::DockerClient;

pub mod list;
pub mod run;

/// invo - containerised build and test tasks
#[derive(Parser)]
#[command(name = "invo")]
#[command(version, about = "invo - run build and test tasks in containers")]
#[command(long_about = r#"
invo runs build and test tasks in containers. Tasks are described in a Lua
control file (invfile.lua by default):

  inv.task('test')
    .using('golang:1.22')
      .run('go', 'test', './...')

COMMANDS:
  run <TASK>...  → Run the given tasks in order
  list           → List the tasks defined in the control file

EXIT CODES:
  0 - Success
  1 - General error
  2 - Control file or configuration error
  3 - Step failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args)]
pub struct GlobalArgs {
    /// Control file to evaluate
    #[arg(short = 'f', long, global = true, env = "INVO_FILE", default_value = "invfile.lua")]
    pub file: PathBuf,

    /// Evaluate this script instead of the control file
    #[arg(short = 'e', long = "eval", global = true, value_name = "SCRIPT")]
    pub script: Option<String>,

    /// Directory relative binds are resolved against [default: current directory]
    #[arg(short = 'w', long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Docker daemon address (unix://, tcp:// or http://)
    #[arg(short = 'H', long, global = true, env = "DOCKER_HOST")]
    pub host: Option<String>,

    /// Do not pull images missing locally
    #[arg(long, global = true)]
    pub no_pull: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit log records as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    /// Evaluate the control file (or `--eval` script) into a task registry.
    pub fn load_context(&self) -> Result<InvocationContext> {
        let workdir = match &self.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let workdir = workdir
            .canonicalize()
            .with_context(|| format!("Invalid working directory: {}", workdir.display()))?;
        debug!(workdir = %workdir.display(), "Resolved working directory");

        let ctx = match &self.script {
            Some(script) => invo_lua::evaluate_str(script, &workdir)?,
            None => invo_lua::evaluate_file(&self.file, &workdir)?,
        };
        Ok(ctx)
    }

    /// Connect to the configured Docker daemon.
    pub async fn docker_client(&self) -> Result<DockerClient> {
        let client = match &self.host {
            Some(host) => DockerClient::with_host(host).await?,
            None => DockerClient::new().await?,
        };
        Ok(client.pull_missing(!self.no_pull))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run tasks in the given order
    Run(run::RunArgs),

    /// List tasks defined in the control file
    List(list::ListArgs),
}
