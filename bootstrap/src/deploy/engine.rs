//! Container engine abstraction

use async_trait::async_trait;

use crate::deploy::spec::ProxyContainerSpec;
use crate::errors::BootstrapError;

/// Operations the installer needs from a container engine
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// IDs of all containers (running or not) carrying `label`
    async fn list_by_label(&self, label: &str) -> Result<Vec<String>, BootstrapError>;

    /// Remove a container, killing it first if it is running
    async fn force_remove(&self, id: &str) -> Result<(), BootstrapError>;

    /// Pull `image`, consuming the progress stream until it ends
    async fn pull_image(&self, image: &str) -> Result<(), BootstrapError>;

    /// Create a container and return its ID
    async fn create(&self, spec: &ProxyContainerSpec) -> Result<String, BootstrapError>;

    async fn start(&self, id: &str) -> Result<(), BootstrapError>;
}

/// Opens engine sessions for an endpoint such as `unix:///var/run/docker.sock`
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Fails with `EngineUnreachableError` when the engine does not answer
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn ContainerEngine>, BootstrapError>;
}
