//! Kubelet configuration patching

use serde_json::Value;
use tracing::{debug, info};

use crate::errors::BootstrapError;
use crate::filesys::file::File;
use crate::kubelet::overrides::DesiredOverrides;
use crate::models::kubelet::{LiveConfig, ENGINE_ENDPOINT_KEY};

/// Result of a patch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOutcome {
    /// Every override was already in place; nothing was written
    AlreadyPatched(LiveConfig),

    /// The original config was backed up and the overrides applied
    Patched {
        config: LiveConfig,
        engine_endpoint: String,
    },
}

/// Decides on and applies the CRI proxy overrides
#[derive(Debug, Clone, Copy)]
pub struct ConfigPatcher<'a> {
    overrides: &'a DesiredOverrides,
}

impl<'a> ConfigPatcher<'a> {
    pub fn new(overrides: &'a DesiredOverrides) -> Self {
        Self { overrides }
    }

    /// True iff every override key is present with an exactly equal value
    pub fn is_already_patched(&self, live: &LiveConfig) -> bool {
        self.overrides
            .iter()
            .all(|(key, value)| live.get(key) == Some(value))
    }

    /// Overwrite every override key, discarding prior values
    pub fn apply_overrides(&self, live: &mut LiveConfig) {
        for (key, value) in self.overrides.iter() {
            live.insert(key.to_string(), value.clone());
        }
    }

    /// Back up `live` to `backup`, then apply the overrides and extract the engine endpoint
    ///
    /// The backup is written before any mutation; if it fails the config is left alone.
    pub async fn patch(&self, mut live: LiveConfig, backup: &File) -> Result<PatchOutcome, BootstrapError> {
        if self.is_already_patched(&live) {
            debug!("Kubelet config already points at the CRI proxy");
            return Ok(PatchOutcome::AlreadyPatched(live));
        }

        backup.write_json_private(&live).await.map_err(|e| {
            BootstrapError::PersistenceError(format!(
                "error writing {:?}: {}",
                backup.path(),
                e
            ))
        })?;
        info!("Saved original kubelet config to {:?}", backup.path());

        self.apply_overrides(&mut live);
        let engine_endpoint = extract_engine_endpoint(&live)?;

        Ok(PatchOutcome::Patched {
            config: live,
            engine_endpoint,
        })
    }
}

/// Read the container engine endpoint from a kubelet config
pub fn extract_engine_endpoint(live: &LiveConfig) -> Result<String, BootstrapError> {
    match live.get(ENGINE_ENDPOINT_KEY) {
        Some(Value::String(endpoint)) => Ok(endpoint.clone()),
        _ => Err(BootstrapError::MissingFieldError(format!(
            "failed to retrieve {} from kubelet config",
            ENGINE_ENDPOINT_KEY
        ))),
    }
}
