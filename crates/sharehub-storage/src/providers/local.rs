//! Local filesystem metadata storage.
//!
//! Index entries are materialized as symlinks whose *target string* is
//! the primary-key value; the target is never dereferenced as a real
//! path. Symlink creation is the atomic create-if-not-exists primitive.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use sharehub_core::error::{AppError, ErrorKind};
use sharehub_core::result::AppResult;
use sharehub_core::traits::MetadataStorage;

/// Local filesystem metadata storage rooted at a namespace directory.
#[derive(Debug, Clone)]
pub struct LocalMetadataStorage {
    /// Root directory for all metadata blobs.
    root: PathBuf,
}

impl LocalMetadataStorage {
    /// Create a new local metadata storage rooted at the given path.
    ///
    /// Does not touch the filesystem; heavier setup happens in
    /// [`MetadataStorage::init`] on first use.
    pub fn new(root_path: &str) -> Self {
        Self {
            root: PathBuf::from(root_path),
        }
    }

    /// Resolve a relative path to an absolute path within the root.
    fn resolve(&self, path: &str) -> PathBuf {
        let clean = path.trim_start_matches('/');
        self.root.join(clean)
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

fn map_io(path: &str, action: &str, e: std::io::Error) -> AppError {
    match e.kind() {
        std::io::ErrorKind::NotFound => AppError::not_found(format!("Path not found: {path}")),
        std::io::ErrorKind::AlreadyExists => {
            AppError::already_exists(format!("Path already exists: {path}"))
        }
        _ => AppError::with_source(ErrorKind::Storage, format!("Failed to {action}: {path}"), e),
    }
}

#[async_trait]
impl MetadataStorage for LocalMetadataStorage {
    fn backend_type(&self) -> &str {
        "local"
    }

    async fn init(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", self.root.display()),
                e,
            )
        })?;
        Ok(())
    }

    async fn make_dir_if_not_exist(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path);
        fs::create_dir_all(&full_path)
            .await
            .map_err(|e| map_io(path, "create directory", e))?;
        Ok(())
    }

    async fn simple_upload(&self, path: &str, data: Bytes) -> AppResult<()> {
        let full_path = self.resolve(path);
        self.ensure_parent(&full_path).await?;

        fs::write(&full_path, &data)
            .await
            .map_err(|e| map_io(path, "write blob", e))?;

        debug!(path, bytes = data.len(), "Wrote blob");
        Ok(())
    }

    async fn simple_download(&self, path: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(path);
        let data = fs::read(&full_path)
            .await
            .map_err(|e| map_io(path, "read blob", e))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path);
        fs::remove_file(&full_path)
            .await
            .map_err(|e| map_io(path, "delete", e))?;
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> AppResult<Vec<String>> {
        let full_path = self.resolve(path);

        let mut dir = match fs::read_dir(&full_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_io(path, "list directory", e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| map_io(path, "read directory entry", e))?
        {
            entries.push(entry.file_name().to_string_lossy().to_string());
        }
        entries.sort();
        Ok(entries)
    }

    async fn create_symlink(&self, target: &str, link: &str) -> AppResult<()> {
        let full_path = self.resolve(link);
        self.ensure_parent(&full_path).await?;

        fs::symlink(target, &full_path)
            .await
            .map_err(|e| map_io(link, "create symlink", e))?;
        Ok(())
    }

    async fn resolve_symlink(&self, link: &str) -> AppResult<String> {
        let full_path = self.resolve(link);
        let target = fs::read_link(&full_path)
            .await
            .map_err(|e| map_io(link, "resolve symlink", e))?;
        Ok(target.to_string_lossy().to_string())
    }
}
