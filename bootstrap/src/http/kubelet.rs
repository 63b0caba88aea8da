//! Kubelet introspection endpoints

use serde_json::Value;
use tracing::debug;

use crate::errors::BootstrapError;
use crate::http::client::HttpClient;
use crate::models::kubelet::{LiveConfig, NodeIdentity};

/// Path of the kubelet live configuration endpoint
pub const CONFIGZ_PATH: &str = "/configz";

/// Path of the kubelet stats summary endpoint
pub const STATS_SUMMARY_PATH: &str = "/stats/summary";

impl HttpClient {
    /// Fetch the kubelet's live configuration
    pub async fn fetch_live_config(&self, configz_base_url: &str) -> Result<LiveConfig, BootstrapError> {
        let mut body = self.get_json_object(configz_base_url, CONFIGZ_PATH).await?;

        match body.remove("componentconfig") {
            Some(Value::Object(config)) => {
                debug!("Fetched kubelet config with {} keys", config.len());
                Ok(config)
            }
            _ => Err(BootstrapError::MissingFieldError(format!(
                "couldn't get componentconfig from {}",
                CONFIGZ_PATH
            ))),
        }
    }

    /// Fetch the node name from the stats summary
    pub async fn fetch_node_identity(&self, stats_base_url: &str) -> Result<NodeIdentity, BootstrapError> {
        let body = self.get_json_object(stats_base_url, STATS_SUMMARY_PATH).await?;

        let node = body.get("node").and_then(Value::as_object).ok_or_else(|| {
            BootstrapError::MissingFieldError(format!(
                "couldn't get node properties from {}",
                STATS_SUMMARY_PATH
            ))
        })?;

        let name = node
            .get("nodeName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                BootstrapError::MissingFieldError(format!(
                    "couldn't get node name via {}",
                    STATS_SUMMARY_PATH
                ))
            })?;

        NodeIdentity::new(name)
    }
}
