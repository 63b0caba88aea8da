//! Bootstrap configuration options

use std::path::PathBuf;

use crate::deploy::readiness::ReadinessOptions;
use crate::errors::BootstrapError;
use crate::http::client::IntrospectionOptions;

/// Inputs of one bootstrap run
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    /// Base URL serving `/configz`
    pub configz_base_url: String,

    /// Base URL serving `/stats/summary`
    pub stats_base_url: String,

    /// Where the unpatched kubelet config is saved
    pub saved_config_path: PathBuf,

    /// Host path of the proxy executable
    pub proxy_path: String,

    /// Arguments passed to the proxy
    pub proxy_args: Vec<String>,

    /// Socket the proxy listens on once it is up
    pub proxy_socket_path: PathBuf,
}

impl BootstrapConfig {
    /// Reject configs missing an endpoint or proxy location, before any I/O
    pub fn validate(&self) -> Result<(), BootstrapError> {
        let missing = [
            ("configz base URL", self.configz_base_url.is_empty()),
            ("stats base URL", self.stats_base_url.is_empty()),
            ("proxy path", self.proxy_path.is_empty()),
            ("proxy socket path", self.proxy_socket_path.as_os_str().is_empty()),
        ];
        let missing: Vec<&str> = missing
            .iter()
            .filter(|(_, empty)| *empty)
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(BootstrapError::ValidationError(format!(
                "invalid bootstrap config, missing: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// How the bootstrap talks to its collaborators
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Kubelet introspection client options
    pub introspection: IntrospectionOptions,

    /// Proxy socket readiness poll
    pub readiness: ReadinessOptions,

    /// Reinstall the proxy when the config is patched but the socket is dead
    pub verify_proxy_liveness: bool,
}
