//! # invo_core
//!
//! Task model for invo.
//!
//! A build description fills an [`InvocationContext`] through immutable
//! builder snapshots ([`BuilderState`], [`UsingBuilderState`]). Each call
//! to `run` appends a finished step to a named task. The [`TaskRunner`]
//! later executes the steps of the requested tasks against a container
//! client.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use invo_core::{BuilderState, InvocationContext, TaskRunner};
//! use invo_runner::MockClient;
//!
//! # async fn example() -> invo_core::CoreResult<()> {
//! let ctx = InvocationContext::new("/work");
//! BuilderState::new(ctx.clone())
//!     .task("test")?
//!     .using("golang")?
//!     .run(["go", "test", "./..."])?;
//!
//! let runner = TaskRunner::new(Arc::new(MockClient::new()));
//! let report = runner.run_task(&ctx, "test").await?;
//! assert_eq!(report.steps.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod context;
pub mod error;
pub mod registry;
pub mod runner;

pub use builder::{BuilderState, UsingBuilderState, DEFAULT_TASK};
pub use context::InvocationContext;
pub use error::{CoreError, CoreResult};
pub use registry::TaskRegistry;
pub use runner::{StepReport, TaskReport, TaskRunner};
