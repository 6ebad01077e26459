//! invo CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Control file or configuration error
//! - 3: Step failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use invo_core::CoreError;
use invo_lua::ScriptError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const SCRIPT_ERROR: u8 = 2;
    pub const STEP_FAILURE: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.log_json);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.global).await,
        Commands::List(args) => commands::list::execute(args, &cli.global),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "invo=debug,warn" } else { "invo=info,warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_result = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<ScriptError>().is_some() {
        return ExitCodes::SCRIPT_ERROR;
    }
    match e.downcast_ref::<CoreError>() {
        Some(CoreError::StepFailed { .. }) => ExitCodes::STEP_FAILURE,
        Some(err) if err.is_configuration() => ExitCodes::SCRIPT_ERROR,
        Some(CoreError::TaskNotFound(_)) => ExitCodes::SCRIPT_ERROR,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
