//! Kubelet settings that route runtime calls through the CRI proxy

use std::sync::LazyLock;

use serde_json::Value;

/// Socket the CRI proxy listens on
pub const PROXY_RUNTIME_ENDPOINT: &str = "/run/criproxy.sock";

/// Kubelet settings selecting the CRI proxy
pub static CRI_PROXY_OVERRIDES: LazyLock<DesiredOverrides> = LazyLock::new(DesiredOverrides::cri_proxy);

/// Fixed table of kubelet settings a patched configuration must carry
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredOverrides {
    entries: Vec<(&'static str, Value)>,
}

impl DesiredOverrides {
    /// The four settings that point the kubelet at the proxy socket
    pub fn cri_proxy() -> Self {
        Self {
            entries: vec![
                ("containerRuntime", Value::from("remote")),
                ("enableCRI", Value::Bool(true)),
                ("remoteRuntimeEndpoint", Value::from(PROXY_RUNTIME_ENDPOINT)),
                ("remoteImageEndpoint", Value::from(PROXY_RUNTIME_ENDPOINT)),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
