//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::options::{BootstrapConfig, BootstrapOptions};
use crate::deploy::readiness::ReadinessOptions;
use crate::http::client::IntrospectionOptions;
use crate::logs::LogLevel;

/// Bootstrap settings, read from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,

    /// Also write logs to this file
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Kubelet endpoints
    #[serde(default)]
    pub kubelet: KubeletSettings,

    /// Proxy installation
    #[serde(default)]
    pub proxy: ProxySettings,

    /// Where the unpatched kubelet config is saved
    #[serde(default = "default_saved_config_path")]
    pub saved_config_path: PathBuf,

    /// Reinstall the proxy when the config is patched but the socket is dead
    #[serde(default)]
    pub verify_proxy_liveness: bool,
}

fn default_true() -> bool {
    true
}

fn default_saved_config_path() -> PathBuf {
    PathBuf::from("/etc/criproxy/kubelet.conf")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_file: None,
            kubelet: KubeletSettings::default(),
            proxy: ProxySettings::default(),
            saved_config_path: default_saved_config_path(),
            verify_proxy_liveness: false,
        }
    }
}

impl Settings {
    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            configz_base_url: self.kubelet.configz_base_url.clone(),
            stats_base_url: self.kubelet.stats_base_url.clone(),
            saved_config_path: self.saved_config_path.clone(),
            proxy_path: self.proxy.path.clone(),
            proxy_args: self.proxy.args.clone(),
            proxy_socket_path: self.proxy.socket_path.clone(),
        }
    }

    pub fn bootstrap_options(&self) -> BootstrapOptions {
        BootstrapOptions {
            introspection: IntrospectionOptions {
                insecure_skip_verify: self.kubelet.insecure_skip_verify,
                timeout: Duration::from_secs(self.kubelet.timeout_secs),
            },
            readiness: ReadinessOptions {
                timeout: Duration::from_millis(self.proxy.socket_timeout_ms),
                poll_interval: Duration::from_millis(self.proxy.socket_poll_interval_ms),
            },
            verify_proxy_liveness: self.verify_proxy_liveness,
        }
    }
}

/// Kubelet introspection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeletSettings {
    /// Base URL serving `/configz`
    #[serde(default = "default_configz_url")]
    pub configz_base_url: String,

    /// Base URL serving `/stats/summary`
    #[serde(default = "default_stats_url")]
    pub stats_base_url: String,

    /// Accept the kubelet's self-signed certificate
    #[serde(default = "default_true")]
    pub insecure_skip_verify: bool,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_configz_url() -> String {
    "https://127.0.0.1:10250".to_string()
}

fn default_stats_url() -> String {
    "http://127.0.0.1:10255".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

impl Default for KubeletSettings {
    fn default() -> Self {
        Self {
            configz_base_url: default_configz_url(),
            stats_base_url: default_stats_url(),
            insecure_skip_verify: true,
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Proxy installation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Host path of the proxy executable
    #[serde(default = "default_proxy_path")]
    pub path: String,

    /// Arguments passed to the proxy
    #[serde(default)]
    pub args: Vec<String>,

    /// Socket the proxy listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_ms: u64,

    #[serde(default = "default_socket_poll_interval")]
    pub socket_poll_interval_ms: u64,
}

fn default_proxy_path() -> String {
    "/usr/local/bin/criproxy".to_string()
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(crate::kubelet::overrides::PROXY_RUNTIME_ENDPOINT)
}

fn default_socket_timeout() -> u64 {
    5_000
}

fn default_socket_poll_interval() -> u64 {
    50
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            path: default_proxy_path(),
            args: Vec::new(),
            socket_path: default_socket_path(),
            socket_timeout_ms: default_socket_timeout(),
            socket_poll_interval_ms: default_socket_poll_interval(),
        }
    }
}
