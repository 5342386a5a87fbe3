//! Metadata storage trait for pluggable blob backends.
//!
//! Share managers and the indexer treat the backend as a flat,
//! path-addressable byte store with last-write-wins semantics per path.
//! Errors must distinguish not-found ([`crate::error::ErrorKind::NotFound`])
//! and already-exists ([`crate::error::ErrorKind::AlreadyExists`]) from
//! other failures: idempotent delete, lazy expiry, and exclusive-create
//! callers all branch on those kinds.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Trait for metadata blob storage backends.
///
/// Implementations exist for the local filesystem; a remote metadata
/// service can slot in behind the same trait. The trait is defined here
/// in `sharehub-core` and implemented in `sharehub-storage`.
#[async_trait]
pub trait MetadataStorage: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend type name (e.g., "local").
    fn backend_type(&self) -> &str;

    /// Prepare the backend for use (create the namespace root).
    async fn init(&self) -> AppResult<()>;

    /// Create a directory (and missing parents); succeeds if it exists.
    async fn make_dir_if_not_exist(&self, path: &str) -> AppResult<()>;

    /// Write a whole blob at the given path, overwriting any previous
    /// content (last-write-wins).
    async fn simple_upload(&self, path: &str, data: Bytes) -> AppResult<()>;

    /// Read a whole blob. Returns a not-found error if absent.
    async fn simple_download(&self, path: &str) -> AppResult<Bytes>;

    /// Delete a blob or symlink. Returns a not-found error if absent so
    /// callers can treat "already gone" as success.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// List entry names (not full paths) under a directory. A missing
    /// directory yields an empty listing.
    async fn read_dir(&self, path: &str) -> AppResult<Vec<String>>;

    /// Atomically create a symlink at `link` whose target is `target`.
    ///
    /// Fails with an already-exists error if `link` is taken. This is the
    /// sole cross-process mutual-exclusion primitive: the first writer to
    /// claim a link wins.
    async fn create_symlink(&self, target: &str, link: &str) -> AppResult<()>;

    /// Read the target of a symlink. Returns a not-found error if absent.
    async fn resolve_symlink(&self, link: &str) -> AppResult<String>;
}
