//! Kubelet configuration models

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::BootstrapError;
use crate::filesys::file::File;

/// Kubelet configuration as reported by `/configz`
///
/// Keys keep their original order and numbers keep their exact textual form, so a
/// backup written from this map reads back identical.
pub type LiveConfig = Map<String, Value>;

/// Key holding the container engine endpoint in the kubelet configuration
pub const ENGINE_ENDPOINT_KEY: &str = "dockerEndpoint";

/// Canonical node name as reported by the kubelet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity(String);

impl NodeIdentity {
    /// Wrap a node name, rejecting the empty string
    pub fn new(name: impl Into<String>) -> Result<Self, BootstrapError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BootstrapError::MissingFieldError(
                "node name is empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted kubelet configuration
///
/// Only the runtime selection fields are typed; everything else is carried through
/// untouched in `other`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<String>,

    #[serde(rename = "enableCRI", default, skip_serializing_if = "Option::is_none")]
    pub enable_cri: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_runtime_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_image_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_endpoint: Option<String>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl KubeletConfiguration {
    /// Whether the kubelet talks to a remote CRI runtime
    pub fn uses_remote_runtime(&self) -> bool {
        self.container_runtime.as_deref() == Some("remote")
    }
}

/// Load a persisted kubelet configuration, such as the pre-patch backup
pub async fn load_kubelet_config(path: impl AsRef<Path>) -> Result<KubeletConfiguration, BootstrapError> {
    let path = path.as_ref();
    let contents = File::new(path).read_string().await.map_err(|e| {
        BootstrapError::PersistenceError(format!(
            "failed to read kubelet config from {:?}: {}",
            path, e
        ))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        BootstrapError::DecodeError(format!(
            "failed to load kubelet config from {:?}: {}",
            path, e
        ))
    })
}
