//! Task builder state machine.
//!
//! A build description is assembled through a chain of snapshots. Every
//! transition borrows its receiver and returns a new value, so a snapshot
//! kept in a variable can be continued along several branches without one
//! branch seeing the other's configuration.
//!
//! There are two kinds of snapshot:
//!
//! - [`BuilderState`]: a task is selected but no image yet. Offers `task`,
//!   `using` and `wrap`.
//! - [`UsingBuilderState`]: an image is selected. Additionally offers `run`,
//!   `with_expectation`, `with_config` and `with_host_config`.
//!
//! `run` is the only transition with an effect outside the snapshot: it
//! appends the finished step to the task registry of the invocation.

use invo_runner::{
    ContainerConfig, ContainerConfigOverlay, ExecuteImage, ExpectationSpec, HostConfig,
    HostConfigOverlay, DEFAULT_WORKING_DIR,
};
use tracing::{debug, info};

use crate::context::InvocationContext;
use crate::error::{CoreError, CoreResult};

/// Task id used until the description selects one.
pub const DEFAULT_TASK: &str = "default";

/// Snapshot without a selected image.
#[derive(Debug, Clone)]
pub struct BuilderState {
    ctx: InvocationContext,
    task_id: String,
}

impl BuilderState {
    /// Root snapshot of an invocation.
    pub fn new(ctx: InvocationContext) -> Self {
        Self {
            ctx,
            task_id: DEFAULT_TASK.to_string(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context(&self) -> &InvocationContext {
        &self.ctx
    }

    /// Select the task further steps are registered under.
    pub fn task(&self, id: &str) -> CoreResult<BuilderState> {
        Ok(Self {
            ctx: self.ctx.clone(),
            task_id: valid_task_id(id)?,
        })
    }

    /// Select the image for the following steps.
    ///
    /// Starts from a clean configuration: the working directory mounted at
    /// `/source`, default expectation.
    pub fn using(&self, image: &str) -> CoreResult<UsingBuilderState> {
        if image.trim().is_empty() {
            return Err(CoreError::InvalidImage(image.to_string()));
        }
        debug!(task = %self.task_id, image = %image, "Using image");

        Ok(UsingBuilderState {
            base: self.clone(),
            step: ExecuteImage::new(ContainerConfig::new(image))
                .host_config(HostConfig::with_default_bind()),
        })
    }

    /// End the current chain.
    pub fn wrap(&self) -> BuilderState {
        self.clone()
    }
}

/// Snapshot with a selected image.
#[derive(Debug, Clone)]
pub struct UsingBuilderState {
    base: BuilderState,
    step: ExecuteImage,
}

impl UsingBuilderState {
    pub fn task_id(&self) -> &str {
        self.base.task_id()
    }

    /// The step as it would be registered by `run` (binds not yet resolved).
    pub fn step(&self) -> &ExecuteImage {
        &self.step
    }

    /// Select another image, discarding the configuration of this one.
    pub fn using(&self, image: &str) -> CoreResult<UsingBuilderState> {
        self.base.using(image)
    }

    /// Move to another task, keeping the image configuration.
    pub fn task(&self, id: &str) -> CoreResult<UsingBuilderState> {
        Ok(Self {
            base: self.base.task(id)?,
            step: self.step.clone(),
        })
    }

    /// End the current chain, returning the snapshot without image.
    pub fn wrap(&self) -> BuilderState {
        self.base.clone()
    }

    /// Finish a step running `args` and register it with the current task.
    ///
    /// Relative bind sources are resolved against the invocation's working
    /// directory here, so a malformed bind fails at this call.
    pub fn run<I, S>(&self, args: I) -> CoreResult<UsingBuilderState>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut step = self.step.clone();
        step.config.command = args.into_iter().map(Into::into).collect();
        if step.config.working_dir.is_none() {
            step.config.working_dir = Some(DEFAULT_WORKING_DIR.to_string());
        }
        step.host_config = step.host_config.resolved(self.base.ctx.working_dir())?;

        let index = self.base.ctx.register(self.task_id(), step.clone());
        info!(
            task = %self.task_id(),
            step = index + 1,
            "Added step {}",
            step.describe()
        );

        Ok(Self {
            base: self.base.clone(),
            step,
        })
    }

    /// Overlay the expectation with the fields set in `spec`.
    pub fn with_expectation(&self, spec: &ExpectationSpec) -> CoreResult<UsingBuilderState> {
        let expectation = self.step.expectation.apply(spec)?;
        if let Some(code) = spec.code {
            debug!(task = %self.task_id(), code, "Expecting code");
        }
        Ok(Self {
            base: self.base.clone(),
            step: self.step.clone().expectation(expectation),
        })
    }

    /// Overlay the container configuration.
    pub fn with_config(&self, overlay: &ContainerConfigOverlay) -> CoreResult<UsingBuilderState> {
        let config = self.step.config.overlay(overlay);
        if config.image.trim().is_empty() {
            return Err(CoreError::InvalidImage(config.image));
        }
        let mut step = self.step.clone();
        step.config = config;
        Ok(Self {
            base: self.base.clone(),
            step,
        })
    }

    /// Overlay the host configuration.
    pub fn with_host_config(&self, overlay: &HostConfigOverlay) -> UsingBuilderState {
        let host_config = self.step.host_config.overlay(overlay);
        Self {
            base: self.base.clone(),
            step: self.step.clone().host_config(host_config),
        }
    }
}

fn valid_task_id(id: &str) -> CoreResult<String> {
    if id.trim().is_empty() {
        return Err(CoreError::InvalidTaskId(id.to_string()));
    }
    Ok(id.to_string())
}
