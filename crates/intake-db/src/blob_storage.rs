//! Filesystem blob store for uploaded documents.
//!
//! Objects are keyed by relative path (`{user}/{client}/{millis}_{name}`).
//! Writes go to a temp file first and are published with a hard link, which
//! fails if the target exists. That gives create-if-absent without a window
//! where a half-written object is visible.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use intake_core::uuid_utils::new_v7;
use intake_core::{BlobStore, Error, Result};

/// Filesystem storage backend.
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a new filesystem store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(Error::Storage(format!("invalid object path: {:?}", path)));
        }
        Ok(self.base_path.join(relative))
    }

    /// Validate that the store can write, read, and delete files.
    ///
    /// Run at startup so permission problems show up before the first upload.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join(".health-check");
        let test_file = test_dir.join("write_check.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_back = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_back != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_new(&self, path: &str, data: &[u8], content_type: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(
            subsystem = "db",
            component = "blob_storage",
            op = "put_new",
            storage_path = %path,
            content_type,
            byte_len = data.len(),
            "Writing blob"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "blob_storage: create_dir_all failed");
                Error::Storage(format!("create directory: {}", e))
            })?;
        }

        let temp_path = full_path.with_file_name(format!(".{}.tmp", new_v7()));
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage(format!("create temp file: {}", e)))?;
        file.write_all(data)
            .await
            .map_err(|e| Error::Storage(format!("write: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Storage(format!("sync: {}", e)))?;
        drop(file);

        let published = fs::hard_link(&temp_path, &full_path).await;
        let _ = fs::remove_file(&temp_path).await;
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::Storage(format!("object already exists: {}", path)));
            }
            Err(e) => {
                warn!(storage_path = %path, error = %e, "blob_storage: publish failed");
                return Err(Error::Storage(format!("publish: {}", e)));
            }
        }

        // Uploaded content is data, never executable
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        fs::read(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::Storage(format!("object not found: {}", path)),
            _ => Error::Storage(format!("read {}: {}", path, e)),
        })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }
}
