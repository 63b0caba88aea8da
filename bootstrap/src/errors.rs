//! Error types for the CRI proxy bootstrap

use thiserror::Error;

/// Main error type for the bootstrap workflow
///
/// Every stage fails with exactly one of these and the workflow stops there.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Missing field: {0}")]
    MissingFieldError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Cluster config error: {0}")]
    ClusterConfigError(String),

    #[error("Publish error: {0}")]
    PublishError(String),

    #[error("Container engine unreachable: {0}")]
    EngineUnreachableError(String),

    #[error("Image pull error: {0}")]
    ImagePullError(String),

    #[error("Container error: {0}")]
    ContainerError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
