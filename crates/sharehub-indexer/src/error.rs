//! Indexer error type.

use thiserror::Error;

use sharehub_core::error::AppError;

/// Errors raised by index operations.
///
/// `Conflict` carries the offending field and value so callers can run
/// the self-heal pass (delete the stale entry, retry the add once).
#[derive(Debug, Error)]
pub enum IndexError {
    /// A unique index already maps this value to a different primary key.
    #[error("index entry already exists: {field}={value} -> {existing}")]
    Conflict {
        /// Index field name.
        field: String,
        /// Conflicting field value.
        value: String,
        /// Primary key currently holding the value.
        existing: String,
    },

    /// The field is not registered on this indexer.
    #[error("unknown index field: {0}")]
    UnknownField(String),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Conflict { .. } => AppError::already_exists(err.to_string()),
            IndexError::UnknownField(_) => AppError::invalid_argument(err.to_string()),
            IndexError::Storage(e) => e,
        }
    }
}
