//! JSON-document backend: one file per manager, mutated under a lock.
//!
//! Suitable for small single-instance deployments; nothing serializes
//! access across processes, so two instances pointing at the same file
//! will lose updates.

use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;

mod public;
mod share;

pub use public::{JsonPublicShareManager, PublicShareDocument};
pub use share::{JsonShareManager, ShareDocument};

/// Serialized-access wrapper around a JSON document on disk.
///
/// Every access holds one lock across the whole read, mutate, write
/// cycle, so concurrent tasks within the process never interleave
/// partial documents. A missing file reads as the default document.
#[derive(Debug)]
pub struct JsonStore<D> {
    path: PathBuf,
    lock: Mutex<()>,
    _doc: PhantomData<fn() -> D>,
}

impl<D: Serialize + DeserializeOwned + Default> JsonStore<D> {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _doc: PhantomData,
        }
    }

    async fn load(&self) -> AppResult<D> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(D::default()),
            Err(e) => Err(AppError::from(e)),
        }
    }

    async fn save(&self, doc: &D) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(doc)?;
        fs::write(&self.path, data).await?;
        Ok(())
    }

    /// Run a read-only closure against the current document.
    pub async fn read<T>(&self, f: impl FnOnce(&D) -> AppResult<T>) -> AppResult<T> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        f(&doc)
    }

    /// Run a mutating closure; the document is written back only when
    /// the closure succeeds.
    pub async fn with<T>(&self, f: impl FnOnce(&mut D) -> AppResult<T>) -> AppResult<T> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let out = f(&mut doc)?;
        self.save(&doc).await?;
        Ok(out)
    }
}
