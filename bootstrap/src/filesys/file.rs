//! File operations

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::errors::BootstrapError;

/// Mode for files holding node configuration
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, BootstrapError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, BootstrapError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Write JSON readable by the owner only, replacing the file atomically
    pub async fn write_json_private<T: Serialize>(&self, value: &T) -> Result<(), BootstrapError> {
        let contents = serde_json::to_vec_pretty(value)?;
        self.write_private_atomic(&contents).await
    }

    /// Atomic write through a uniquely named temporary sibling with mode 0600
    ///
    /// Readers see either the previous contents or the complete new contents. Other files
    /// next to the target are never touched.
    pub async fn write_private_atomic(&self, contents: &[u8]) -> Result<(), BootstrapError> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).await?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };

        let path = self.path.clone();
        let contents = contents.to_vec();
        tokio::task::spawn_blocking(move || write_via_temp(&parent, &path, &contents))
            .await
            .map_err(std::io::Error::other)??;
        Ok(())
    }
}

fn write_via_temp(parent: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(parent)?;

    temp.write_all(contents)?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(PRIVATE_FILE_MODE))?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
