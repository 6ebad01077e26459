//! # invo_runner
//!
//! Container execution engine for invo.
//!
//! A step is one container: created from an image, started, followed until it
//! exits, and compared against an [`Expectation`]. Containers of steps that
//! exit with code 0 as expected are removed; everything else is left behind
//! for inspection.
//!
//! # Features
//!
//! - **Docker client**: bollard-based [`DockerClient`]
//! - **Bind resolution**: relative `source:dest` binds made absolute
//! - **Expectations**: exit code plus stdout/stderr patterns
//! - **Mock client**: for testing without actual containers
//!
//! # Example
//!
//! ```rust,no_run
//! use invo_runner::{ContainerConfig, DockerClient, ExecuteImage, HostConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DockerClient::new().await?;
//!
//!     let step = ExecuteImage::new(
//!         ContainerConfig::new("alpine").command(vec!["echo".to_string(), "hi".to_string()]),
//!     )
//!     .host_config(HostConfig::with_default_bind().resolved(Path::new("/work"))?);
//!
//!     let result = step.execute(&client).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod binds;
pub mod client;
pub mod config;
pub mod docker;
pub mod engine;
pub mod error;
pub mod expectation;
pub mod mock;

pub use binds::{resolve_bind, resolve_binds};
pub use client::{ContainerClient, ContainerStatus, LogChunk, LogHandler, LogLine, LogStream};
pub use config::{
    ContainerConfig, ContainerConfigOverlay, HostConfig, HostConfigOverlay, DEFAULT_BIND,
    DEFAULT_WORKING_DIR,
};
pub use docker::DockerClient;
pub use engine::{ExecuteImage, ExecutionResult};
pub use error::{RunnerError, RunnerResult};
pub use expectation::{Expectation, ExpectationSpec, Verdict};
pub use mock::{CapturedCall, MockClient, MockOperation, MockResponse};
