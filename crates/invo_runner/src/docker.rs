//! Docker implementation of ContainerClient.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::service::HostConfig as DockerHostConfig;
use bollard::Docker;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::client::{ContainerClient, ContainerStatus, LogChunk};
use crate::config::{ContainerConfig, HostConfig};
use crate::error::{RunnerError, RunnerResult};

/// Transport timeout for engine requests. Waiting on a container is a single
/// request, so this bounds how long a step may run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Docker-based container client.
pub struct DockerClient {
    client: Docker,
    pull_missing: bool,
}

impl DockerClient {
    /// Connect to the local Docker daemon.
    pub async fn new() -> RunnerResult<Self> {
        let client = Docker::connect_with_local_defaults()?;
        Self::verified(client).await
    }

    /// Connect to a Docker daemon given as `unix://`, `tcp://` or `http://` URL.
    pub async fn with_host(host: &str) -> RunnerResult<Self> {
        let client = if let Some(path) = host.strip_prefix("unix://") {
            Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)?
        } else {
            Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)?
        };
        Self::verified(client).await
    }

    async fn verified(client: Docker) -> RunnerResult<Self> {
        let client = client.with_timeout(REQUEST_TIMEOUT);
        client
            .ping()
            .await
            .map_err(|e| RunnerError::DockerNotAvailable(e.to_string()))?;
        Ok(Self {
            client,
            pull_missing: true,
        })
    }

    /// Whether images missing locally are pulled before creating a container.
    pub fn pull_missing(mut self, enabled: bool) -> Self {
        self.pull_missing = enabled;
        self
    }

    async fn image_exists(&self, image: &str) -> RunnerResult<bool> {
        match self.client.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull_image(&self, image: &str) -> RunnerResult<()> {
        let (from_image, tag) = split_image_ref(image);
        info!(image = %image, "Pulling image");

        let options = CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => return Err(RunnerError::ImagePullFailed(e.to_string())),
            }
        }

        info!(image = %image, "Image pulled");
        Ok(())
    }
}

/// Split an image reference into repository and tag, defaulting to `latest`.
///
/// Pulling without a tag would fetch every tag of the repository.
fn split_image_ref(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    match last_segment.rfind(':') {
        Some(pos) => {
            let split = image.len() - last_segment.len() + pos;
            (&image[..split], &image[split + 1..])
        }
        None => (image, "latest"),
    }
}

#[async_trait]
impl ContainerClient for DockerClient {
    async fn create_container(
        &self,
        name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
    ) -> RunnerResult<String> {
        if self.pull_missing && !self.image_exists(&config.image).await? {
            self.pull_image(&config.image).await?;
        }

        let host = DockerHostConfig {
            binds: Some(host_config.binds.clone()),
            privileged: Some(host_config.privileged),
            ..Default::default()
        };

        let body = Config {
            image: Some(config.image.clone()),
            cmd: (!config.command.is_empty()).then(|| config.command.clone()),
            working_dir: config.working_dir.clone(),
            env: (!config.env.is_empty()).then(|| config.env.clone()),
            entrypoint: config.entrypoint.clone(),
            user: config.user.clone(),
            hostname: config.hostname.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name,
            platform: None,
        };

        let response = self.client.create_container(Some(options), body).await?;
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> RunnerResult<()> {
        self.client
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    fn attach_logs<'a>(&'a self, container_id: &'a str) -> BoxStream<'a, RunnerResult<LogChunk>> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        self.client
            .logs(container_id, Some(options))
            .filter_map(|item| async move {
                match item {
                    Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                        Some(Ok(LogChunk::stdout(String::from_utf8_lossy(&message))))
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        Some(Ok(LogChunk::stderr(String::from_utf8_lossy(&message))))
                    }
                    Ok(LogOutput::StdIn { .. }) => None,
                    Err(e) => Some(Err(RunnerError::from(e))),
                }
            })
            .boxed()
    }

    async fn wait_container(&self, container_id: &str) -> RunnerResult<i64> {
        let mut stream = self
            .client
            .wait_container(container_id, None::<WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(exit)) => Ok(exit.status_code),
            // bollard reports a non-zero exit as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(RunnerError::WaitFailed {
                container_id: container_id.to_string(),
                message: "wait stream ended without an exit status".to_string(),
            }),
        }
    }

    async fn inspect_container(&self, container_id: &str) -> RunnerResult<ContainerStatus> {
        let info = self
            .client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?;
        let state = info.state.unwrap_or_default();

        Ok(ContainerStatus {
            status: state.status.map(|s| s.to_string()).unwrap_or_default(),
            running: state.running.unwrap_or(false),
            exit_code: state.exit_code,
        })
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> RunnerResult<()> {
        self.client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_image_ref() {
        assert_eq!(split_image_ref("alpine"), ("alpine", "latest"));
        assert_eq!(split_image_ref("golang:1.22"), ("golang", "1.22"));
        assert_eq!(
            split_image_ref("localhost:5000/team/app"),
            ("localhost:5000/team/app", "latest")
        );
        assert_eq!(
            split_image_ref("localhost:5000/team/app:v2"),
            ("localhost:5000/team/app", "v2")
        );
        assert_eq!(
            split_image_ref("alpine@sha256:abcd"),
            ("alpine@sha256:abcd", "")
        );
    }
}
