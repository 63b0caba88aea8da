//! HTTP client implementation

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::errors::BootstrapError;

/// Options for talking to the kubelet introspection endpoints
#[derive(Debug, Clone)]
pub struct IntrospectionOptions {
    /// Skip TLS certificate verification.
    ///
    /// The kubelet serves `/configz` with a self-signed certificate on the node itself,
    /// so this is on unless the caller opts into verification.
    pub insecure_skip_verify: bool,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for IntrospectionOptions {
    fn default() -> Self {
        Self {
            insecure_skip_verify: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for kubelet introspection
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: &IntrospectionOptions) -> Result<Self, BootstrapError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_skip_verify)
            .build()
            .map_err(|e| BootstrapError::TransportError(format!("building HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Join a base URL and an absolute path suffix
    pub fn endpoint(base_url: &str, suffix: &str) -> Result<Url, BootstrapError> {
        let raw = format!("{}{}", base_url.trim_end_matches('/'), suffix);
        Url::parse(&raw)
            .map_err(|e| BootstrapError::TransportError(format!("invalid URL {:?}: {}", raw, e)))
    }

    /// GET a JSON object from `{base_url}{suffix}`
    ///
    /// Numbers keep their exact textual form.
    pub async fn get_json_object(
        &self,
        base_url: &str,
        suffix: &str,
    ) -> Result<serde_json::Map<String, Value>, BootstrapError> {
        let url = Self::endpoint(base_url, suffix)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| BootstrapError::TransportError(format!("trying to get {:?}: {}", url.as_str(), e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET {} failed: {} - {}", url, status, body);
            return Err(BootstrapError::TransportError(format!(
                "GET {:?}: {}: {}",
                url.as_str(),
                status,
                body
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            BootstrapError::TransportError(format!("reading body of {:?}: {}", url.as_str(), e))
        })?;

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(BootstrapError::DecodeError(format!(
                "expected a JSON object from {:?}, got {}",
                url.as_str(),
                json_kind(&other)
            ))),
            Err(e) => Err(BootstrapError::DecodeError(format!(
                "failed to unmarshal json from {:?}: {}",
                url.as_str(),
                e
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
