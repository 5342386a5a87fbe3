//! Metadata-blob backend: one blob per record, secondary index alongside.
//!
//! Write protocol: the record blob is written first, index entries
//! second. A crash in between leaves a blob no index entry points at
//! (invisible until re-indexed) but never an entry pointing at nothing a
//! reader cannot tolerate.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::warn;

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::traits::Indexable;
use sharehub_indexer::indexer::IndexResult;
use sharehub_indexer::{IndexError, Indexer};

mod public;
mod share;

pub use public::MetadataPublicShareManager;
pub use share::MetadataShareManager;

/// Double-checked lazy initialization gate.
///
/// The flag is only set after the closure succeeds, so a failed init
/// does not poison later retries; concurrent callers serialize on the
/// mutex and the winner initializes once.
#[derive(Debug, Default)]
pub(crate) struct InitGuard {
    done: AtomicBool,
    lock: Mutex<()>,
}

impl InitGuard {
    pub(crate) async fn ensure<F, Fut>(&self, init: F) -> AppResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        if self.done.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        if self.done.load(Ordering::Acquire) {
            return Ok(());
        }
        init().await?;
        self.done.store(true, Ordering::Release);
        Ok(())
    }
}

/// Index a freshly written record, healing one stale entry.
///
/// A conflict here cannot be a genuine duplicate (the manager checked
/// the composite key before uploading the blob), so the existing entry
/// is presumed left over from a crashed delete: drop it and retry once.
/// A second conflict propagates.
pub(crate) async fn add_with_heal<R: Indexable>(
    indexer: &Indexer<R>,
    record: &R,
) -> AppResult<Vec<IndexResult>> {
    match indexer.add(record).await {
        Ok(results) => Ok(results),
        Err(IndexError::Conflict {
            field,
            value,
            existing,
        }) => {
            warn!(field, value, existing, "Healing stale index entry");
            indexer.remove_entry(&field, &value).await?;
            indexer.add(record).await.map_err(AppError::from)
        }
        Err(e) => Err(e.into()),
    }
}
