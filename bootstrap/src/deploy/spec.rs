//! CRI proxy container definition

use std::collections::BTreeMap;

/// Helper image hosting the proxy binary; pinned so every node runs the same base
pub const PROXY_IMAGE: &str = "busybox:1.26.2";

/// Label key marking containers managed by this bootstrap
pub const MARKER_LABEL: &str = "criproxy";

/// Where the proxy binary is mounted inside the container
pub const IN_CONTAINER_PROXY_PATH: &str = "/criproxy";

/// Where a host engine socket is mounted inside the container
pub const IN_CONTAINER_ENGINE_SOCKET: &str = "/var/run/docker.sock";

/// Environment variable telling the proxy which engine to wrap
pub const ENGINE_HOST_ENV: &str = "DOCKER_HOST";

const UNIX_SCHEME: &str = "unix://";

/// Host directory shared with the container so the proxy socket lands on the host
const RUN_DIR: &str = "/run";

/// Everything needed to create the proxy container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyContainerSpec {
    pub name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    /// `host:container` bind mounts
    pub binds: Vec<String>,
    pub network_mode: String,
    pub restart_policy: String,
}

impl ProxyContainerSpec {
    /// Build the spec for a proxy wrapping `engine_endpoint`
    ///
    /// `suffix` makes the container name unique across runs.
    pub fn build(engine_endpoint: &str, proxy_path: &str, args: &[String], suffix: i64) -> Self {
        let mut binds = vec![
            format!("{}:{}", RUN_DIR, RUN_DIR),
            format!("{}:{}", proxy_path, IN_CONTAINER_PROXY_PATH),
        ];

        let mut endpoint = engine_endpoint.to_string();
        if let Some(socket_path) = engine_endpoint.strip_prefix(UNIX_SCHEME) {
            // the host socket is outside the container's mount namespace
            binds.push(format!("{}:{}", socket_path, IN_CONTAINER_ENGINE_SOCKET));
            endpoint = format!("{}{}", UNIX_SCHEME, IN_CONTAINER_ENGINE_SOCKET);
        }

        let mut cmd = Vec::with_capacity(args.len() + 1);
        cmd.push(IN_CONTAINER_PROXY_PATH.to_string());
        cmd.extend(args.iter().cloned());

        Self {
            name: format!("criproxy-{}", suffix),
            image: PROXY_IMAGE.to_string(),
            labels: BTreeMap::from([(MARKER_LABEL.to_string(), "true".to_string())]),
            env: vec![format!("{}={}", ENGINE_HOST_ENV, endpoint)],
            cmd,
            binds,
            // the proxy must reach engines listening on localhost
            network_mode: "host".to_string(),
            restart_policy: "always".to_string(),
        }
    }

    /// Value of the engine endpoint variable passed to the proxy
    pub fn engine_host(&self) -> Option<&str> {
        let prefix = format!("{}=", ENGINE_HOST_ENV);
        self.env.iter().find_map(|var| var.strip_prefix(prefix.as_str()))
    }
}
