//! Publishing the patched kubelet config to the cluster

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PostParams;
use kube::{Api, Client, Config};
use tracing::{debug, info};

use crate::errors::BootstrapError;
use crate::models::kubelet::{LiveConfig, NodeIdentity};

/// Namespace holding the per-node kubelet config records
pub const RECORD_NAMESPACE: &str = "kube-system";

/// Data key carrying the serialized kubelet config
pub const RECORD_DATA_KEY: &str = "kubelet.config";

/// Patched kubelet config as published to the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRecord {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
}

impl ClusterRecord {
    /// Build the record for `node` carrying `config`
    pub fn for_node(node: &NodeIdentity, config: &LiveConfig) -> Result<Self, BootstrapError> {
        let text = serde_json::to_string(config)?;
        Ok(Self {
            name: record_name(node),
            namespace: RECORD_NAMESPACE.to_string(),
            data: BTreeMap::from([(RECORD_DATA_KEY.to_string(), text)]),
        })
    }

    /// The serialized kubelet config
    pub fn payload(&self) -> Option<&str> {
        self.data.get(RECORD_DATA_KEY).map(String::as_str)
    }

    pub fn to_config_map(&self) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(self.data.clone()),
            ..Default::default()
        }
    }
}

/// Record name for a node
pub fn record_name(node: &NodeIdentity) -> String {
    format!("kubelet-{}", node)
}

/// Sink for cluster records
#[async_trait]
pub trait ClusterRecorder: Send + Sync {
    /// Create the record; an existing record with the same name is an error
    async fn publish(&self, record: &ClusterRecord) -> Result<(), BootstrapError>;
}

/// Recorder backed by the Kubernetes API
pub struct KubeRecorder {
    client: Client,
}

impl KubeRecorder {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a recorder from the in-cluster service account
    pub fn in_cluster() -> Result<Self, BootstrapError> {
        let config = Config::incluster().map_err(|e| {
            BootstrapError::ClusterConfigError(format!("failed to get in-cluster config: {}", e))
        })?;
        let client = Client::try_from(config).map_err(|e| {
            BootstrapError::ClusterConfigError(format!("failed to create client: {}", e))
        })?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ClusterRecorder for KubeRecorder {
    async fn publish(&self, record: &ClusterRecord) -> Result<(), BootstrapError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &record.namespace);
        debug!("Creating ConfigMap {}/{}", record.namespace, record.name);

        api.create(&PostParams::default(), &record.to_config_map())
            .await
            .map_err(|e| {
                BootstrapError::PublishError(format!(
                    "failed to put ConfigMap {}/{}: {}",
                    record.namespace, record.name, e
                ))
            })?;

        info!("Published kubelet config as ConfigMap {}/{}", record.namespace, record.name);
        Ok(())
    }
}
