//! CRI proxy container installer

use chrono::Utc;
use tracing::{info, warn};

use crate::deploy::engine::EngineConnector;
use crate::deploy::spec::{ProxyContainerSpec, MARKER_LABEL, PROXY_IMAGE};
use crate::errors::BootstrapError;

/// Replaces any existing proxy container with a fresh one
pub struct ProxyInstaller<'a> {
    connector: &'a dyn EngineConnector,
}

impl<'a> ProxyInstaller<'a> {
    pub fn new(connector: &'a dyn EngineConnector) -> Self {
        Self { connector }
    }

    /// Install the proxy container and return its ID
    ///
    /// Stale proxy containers are removed before the image pull so a failed cleanup
    /// never leaves two proxies behind.
    pub async fn install(
        &self,
        engine_endpoint: &str,
        proxy_path: &str,
        args: &[String],
    ) -> Result<String, BootstrapError> {
        let engine = self.connector.connect(engine_endpoint).await?;

        let stale = engine.list_by_label(MARKER_LABEL).await?;
        for id in &stale {
            info!("Removing old CRI proxy container {}", id);
            engine.force_remove(id).await.map_err(|e| match e {
                BootstrapError::ContainerError(_) => e,
                other => BootstrapError::ContainerError(format!(
                    "failed to remove old container {}: {}",
                    id, other
                )),
            })?;
        }

        engine.pull_image(PROXY_IMAGE).await.map_err(|e| match e {
            BootstrapError::ImagePullError(_) => e,
            other => BootstrapError::ImagePullError(format!("failed to pull {}: {}", PROXY_IMAGE, other)),
        })?;

        let suffix = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros());
        let spec = ProxyContainerSpec::build(engine_endpoint, proxy_path, args, suffix);

        let id = engine.create(&spec).await?;
        if let Err(e) = engine.start(&id).await {
            if let Err(rm) = engine.force_remove(&id).await {
                warn!("Failed to remove unstarted container {}: {}", id, rm);
            }
            return Err(e);
        }

        info!("Started CRI proxy container {} ({})", spec.name, id);
        Ok(id)
    }
}
