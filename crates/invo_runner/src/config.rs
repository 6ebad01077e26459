//! Container configuration types.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::binds::resolve_binds;
use crate::error::RunnerResult;

/// Working directory used inside the container when none is configured.
pub const DEFAULT_WORKING_DIR: &str = "/source";

/// Bind applied by `using`: the invocation directory mounted at the default
/// working directory.
pub const DEFAULT_BIND: &str = "./:/source";

/// Container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image reference, e.g. `alpine` or `golang:1.22`
    pub image: String,
    /// Command to run
    pub command: Vec<String>,
    /// Working directory inside container
    pub working_dir: Option<String>,
    /// Environment variables as `KEY=VALUE`
    pub env: Vec<String>,
    /// Entrypoint override
    pub entrypoint: Option<Vec<String>>,
    /// User to run as (e.g., "1000:1000")
    pub user: Option<String>,
    /// Hostname inside the container
    pub hostname: Option<String>,
}

impl ContainerConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn command(mut self, cmd: Vec<String>) -> Self {
        self.command = cmd;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env.push(format!("{}={}", key.as_ref(), value.as_ref()));
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Working directory the container will actually use.
    pub fn effective_working_dir(&self) -> &str {
        self.working_dir.as_deref().unwrap_or(DEFAULT_WORKING_DIR)
    }

    /// Copy of this configuration with every field set in `overlay` replaced.
    pub fn overlay(&self, overlay: &ContainerConfigOverlay) -> Self {
        let mut next = self.clone();
        if let Some(image) = &overlay.image {
            next.image = image.clone();
        }
        if let Some(dir) = &overlay.working_dir {
            next.working_dir = Some(dir.clone());
        }
        if let Some(env) = &overlay.env {
            next.env = env.clone();
        }
        if let Some(entrypoint) = &overlay.entrypoint {
            next.entrypoint = Some(entrypoint.clone());
        }
        if let Some(user) = &overlay.user {
            next.user = Some(user.clone());
        }
        if let Some(hostname) = &overlay.hostname {
            next.hostname = Some(hostname.clone());
        }
        next
    }
}

/// Partial container configuration accepted by `withConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfigOverlay {
    pub image: Option<String>,
    pub working_dir: Option<String>,
    pub env: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub user: Option<String>,
    pub hostname: Option<String>,
}

/// Host side of the container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Bind specs of the form `source:dest`
    pub binds: Vec<String>,
    /// Run the container in privileged mode
    pub privileged: bool,
}

impl HostConfig {
    /// Host configuration mounting the invocation directory at `/source`.
    pub fn with_default_bind() -> Self {
        Self {
            binds: vec![DEFAULT_BIND.to_string()],
            privileged: false,
        }
    }

    pub fn bind(mut self, spec: impl Into<String>) -> Self {
        self.binds.push(spec.into());
        self
    }

    /// Copy of this configuration with relative bind sources resolved
    /// against `base`.
    pub fn resolved(&self, base: &Path) -> RunnerResult<Self> {
        Ok(Self {
            binds: resolve_binds(&self.binds, base)?,
            privileged: self.privileged,
        })
    }

    /// Copy of this configuration with every field set in `overlay` replaced.
    pub fn overlay(&self, overlay: &HostConfigOverlay) -> Self {
        let mut next = self.clone();
        if let Some(binds) = &overlay.binds {
            next.binds = binds.clone();
        }
        if let Some(privileged) = overlay.privileged {
            next.privileged = privileged;
        }
        next
    }
}

/// Partial host configuration accepted by `withHostConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfigOverlay {
    pub binds: Option<Vec<String>>,
    pub privileged: Option<bool>,
}
