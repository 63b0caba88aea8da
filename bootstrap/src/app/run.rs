//! Bootstrap workflow

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::options::{BootstrapConfig, BootstrapOptions};
use crate::cluster::recorder::{ClusterRecord, ClusterRecorder, KubeRecorder};
use crate::deploy::docker::DockerCliConnector;
use crate::deploy::engine::EngineConnector;
use crate::deploy::installer::ProxyInstaller;
use crate::deploy::readiness::{socket_ready, wait_for_socket};
use crate::errors::BootstrapError;
use crate::filesys::file::File;
use crate::http::client::HttpClient;
use crate::kubelet::overrides::{DesiredOverrides, CRI_PROXY_OVERRIDES};
use crate::kubelet::patcher::{extract_engine_endpoint, ConfigPatcher, PatchOutcome};
use crate::models::kubelet::LiveConfig;

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The kubelet already used the proxy; nothing was touched
    AlreadyConfigured,

    /// Config patched and recorded, proxy installed and answering
    Bootstrapped { container_id: String },

    /// Config was already patched but the proxy was dead, so it was reinstalled
    Reinstalled { container_id: String },
}

impl BootstrapOutcome {
    /// Whether this run patched the kubelet config
    pub fn patched(&self) -> bool {
        matches!(self, BootstrapOutcome::Bootstrapped { .. })
    }
}

/// The bootstrap pipeline: probe, patch, record, install, wait
pub struct Bootstrapper {
    options: BootstrapOptions,
    overrides: &'static DesiredOverrides,
    recorder: Arc<dyn ClusterRecorder>,
    connector: Arc<dyn EngineConnector>,
}

impl Bootstrapper {
    pub fn new(
        options: BootstrapOptions,
        recorder: Arc<dyn ClusterRecorder>,
        connector: Arc<dyn EngineConnector>,
    ) -> Self {
        Self {
            options,
            overrides: &*CRI_PROXY_OVERRIDES,
            recorder,
            connector,
        }
    }

    /// Run the whole workflow once; every stage is attempted once
    pub async fn run(&self, config: &BootstrapConfig) -> Result<BootstrapOutcome, BootstrapError> {
        config.validate()?;

        let http = HttpClient::new(&self.options.introspection)?;
        let live = http.fetch_live_config(&config.configz_base_url).await?;

        let patcher = ConfigPatcher::new(self.overrides);
        let backup = File::new(&config.saved_config_path);
        let (patched, engine_endpoint) = match patcher.patch(live, &backup).await? {
            PatchOutcome::AlreadyPatched(live) => return self.verify_installed(config, &live).await,
            PatchOutcome::Patched {
                config: patched,
                engine_endpoint,
            } => (patched, engine_endpoint),
        };

        let node = http.fetch_node_identity(&config.stats_base_url).await?;
        let record = ClusterRecord::for_node(&node, &patched)?;
        self.recorder.publish(&record).await?;

        let container_id = self.install_and_wait(config, &engine_endpoint).await?;
        info!("CRI proxy bootstrap complete on node {}", node);
        Ok(BootstrapOutcome::Bootstrapped { container_id })
    }

    async fn verify_installed(
        &self,
        config: &BootstrapConfig,
        live: &LiveConfig,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        if !self.options.verify_proxy_liveness || socket_ready(&config.proxy_socket_path).await {
            info!("Kubelet already configured for the CRI proxy");
            return Ok(BootstrapOutcome::AlreadyConfigured);
        }

        warn!(
            "Kubelet uses the CRI proxy but {:?} is not answering, reinstalling",
            config.proxy_socket_path
        );
        let engine_endpoint = extract_engine_endpoint(live)?;
        let container_id = self.install_and_wait(config, &engine_endpoint).await?;
        Ok(BootstrapOutcome::Reinstalled { container_id })
    }

    async fn install_and_wait(
        &self,
        config: &BootstrapConfig,
        engine_endpoint: &str,
    ) -> Result<String, BootstrapError> {
        let installer = ProxyInstaller::new(self.connector.as_ref());
        let container_id = installer
            .install(engine_endpoint, &config.proxy_path, &config.proxy_args)
            .await?;

        wait_for_socket(&config.proxy_socket_path, &self.options.readiness).await?;
        Ok(container_id)
    }
}

/// Make sure the kubelet uses the CRI proxy and the proxy is running
///
/// `Ok(false)` means the kubelet was already configured, `Ok(true)` that it was
/// patched and the proxy answered. On error the kubelet config may already be backed
/// up and recorded while the proxy is not running.
pub async fn ensure_cri_proxy(config: &BootstrapConfig) -> Result<bool, BootstrapError> {
    ensure_cri_proxy_with(config, BootstrapOptions::default())
        .await
        .map(|outcome| outcome.patched())
}

/// [`ensure_cri_proxy`] with explicit options and the full outcome
pub async fn ensure_cri_proxy_with(
    config: &BootstrapConfig,
    options: BootstrapOptions,
) -> Result<BootstrapOutcome, BootstrapError> {
    config.validate()?;

    let recorder = KubeRecorder::in_cluster()?;
    let bootstrapper = Bootstrapper::new(
        options,
        Arc::new(recorder),
        Arc::new(DockerCliConnector::default()),
    );
    bootstrapper.run(config).await
}
