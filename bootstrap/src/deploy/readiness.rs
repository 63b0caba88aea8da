//! Waiting for the proxy socket

use std::path::Path;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::BootstrapError;

/// Readiness poll options
#[derive(Debug, Clone)]
pub struct ReadinessOptions {
    /// Give up after this long
    pub timeout: Duration,

    /// Delay between connection attempts
    pub poll_interval: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Whether something accepts connections on the socket at `path` right now
pub async fn socket_ready(path: &Path) -> bool {
    UnixStream::connect(path).await.is_ok()
}

/// Poll until the socket at `path` accepts a connection
pub async fn wait_for_socket(path: &Path, options: &ReadinessOptions) -> Result<(), BootstrapError> {
    let deadline = Instant::now() + options.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if socket_ready(path).await {
            debug!("Socket {:?} ready after {} attempt(s)", path, attempts);
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(BootstrapError::TimeoutError(format!(
                "socket {:?} not ready after {:?}",
                path, options.timeout
            )));
        }
        tokio::time::sleep(options.poll_interval.min(deadline - now)).await;
    }
}
