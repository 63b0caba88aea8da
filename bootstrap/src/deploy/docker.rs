//! Docker engine driven through the docker CLI

use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::deploy::engine::{ContainerEngine, EngineConnector};
use crate::deploy::spec::ProxyContainerSpec;
use crate::errors::BootstrapError;

/// Default docker CLI binary
pub const DOCKER_BIN: &str = "docker";

/// Connector spawning the docker CLI against a given host
#[derive(Debug, Clone)]
pub struct DockerCliConnector {
    binary: String,
}

impl DockerCliConnector {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for DockerCliConnector {
    fn default() -> Self {
        Self::new(DOCKER_BIN)
    }
}

#[async_trait]
impl EngineConnector for DockerCliConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ContainerEngine>, BootstrapError> {
        let engine = DockerCli {
            binary: self.binary.clone(),
            host: endpoint.to_string(),
        };

        let output = engine
            .run(&["version", "--format", "{{.Server.Version}}"])
            .await
            .map_err(|e| {
                BootstrapError::EngineUnreachableError(format!("running {}: {}", engine.binary, e))
            })?;
        if !output.status.success() {
            return Err(BootstrapError::EngineUnreachableError(format!(
                "docker at {}: {}",
                endpoint,
                stderr_text(&output)
            )));
        }

        info!(
            "Connected to docker {} at {}",
            String::from_utf8_lossy(&output.stdout).trim(),
            endpoint
        );
        Ok(Box::new(engine))
    }
}

/// One docker CLI session bound to a host endpoint
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    host: String,
}

impl DockerCli {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(["--host", &self.host]);
        command
    }

    async fn run(&self, args: &[&str]) -> std::io::Result<Output> {
        debug!("docker --host {} {}", self.host, args.join(" "));
        self.command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn list_by_label(&self, label: &str) -> Result<Vec<String>, BootstrapError> {
        let filter = format!("label={}", label);
        let output = self
            .run(&["ps", "--all", "--quiet", "--no-trunc", "--filter", &filter])
            .await
            .map_err(|e| BootstrapError::ContainerError(format!("failed to list containers: {}", e)))?;
        if !output.status.success() {
            return Err(BootstrapError::ContainerError(format!(
                "failed to list containers: {}",
                stderr_text(&output)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn force_remove(&self, id: &str) -> Result<(), BootstrapError> {
        let output = self
            .run(&["rm", "--force", id])
            .await
            .map_err(|e| BootstrapError::ContainerError(format!("failed to remove {}: {}", id, e)))?;
        if !output.status.success() {
            return Err(BootstrapError::ContainerError(format!(
                "failed to remove {}: {}",
                id,
                stderr_text(&output)
            )));
        }
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<(), BootstrapError> {
        debug!("Pulling image: {}", image);
        let mut child = self
            .command()
            .args(["pull", image])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BootstrapError::ImagePullError(format!("running docker pull: {}", e)))?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| BootstrapError::ImagePullError("docker pull stderr unavailable".to_string()))?;
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(status)) => debug!("{}", status),
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.kill().await;
                        return Err(BootstrapError::ImagePullError(format!(
                            "error decoding pull progress for {}: {}",
                            image, e
                        )));
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| BootstrapError::ImagePullError(format!("waiting for docker pull: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(BootstrapError::ImagePullError(format!(
                "pulling {}: {}",
                image,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn create(&self, spec: &ProxyContainerSpec) -> Result<String, BootstrapError> {
        let args = create_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&args).await.map_err(|e| {
            BootstrapError::ContainerError(format!("failed to create CRI proxy container: {}", e))
        })?;
        if !output.status.success() {
            return Err(BootstrapError::ContainerError(format!(
                "failed to create CRI proxy container: {}",
                stderr_text(&output)
            )));
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(BootstrapError::ContainerError(
                "docker create returned no container ID".to_string(),
            ));
        }
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), BootstrapError> {
        let output = self.run(&["start", id]).await.map_err(|e| {
            BootstrapError::ContainerError(format!("failed to start CRI proxy container: {}", e))
        })?;
        if !output.status.success() {
            return Err(BootstrapError::ContainerError(format!(
                "failed to start CRI proxy container: {}",
                stderr_text(&output)
            )));
        }
        Ok(())
    }
}

/// `docker create` arguments for a spec
pub fn create_args(spec: &ProxyContainerSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--network".to_string(),
        spec.network_mode.clone(),
        "--restart".to_string(),
        spec.restart_policy.clone(),
    ];
    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    for var in &spec.env {
        args.push("--env".to_string());
        args.push(var.clone());
    }
    for bind in &spec.binds {
        args.push("--volume".to_string());
        args.push(bind.clone());
    }
    args.push(spec.image.clone());
    args.extend(spec.cmd.iter().cloned());
    args
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
