//! # sharehub-indexer
//!
//! Generic secondary-indexing over a [`MetadataStorage`] backend.
//!
//! An [`Indexer`] maps a record type's field values to primary keys.
//! Each (field value → primary key) mapping is one individually
//! addressable symlink under the blob store, so "does this value exist"
//! is a single storage lookup rather than a scan. Supported index kinds:
//!
//! - **unique**: at most one primary key per value; conflicting adds fail.
//! - **non-unique**: a value maps to a set of primary keys.
//! - **autoincrement**: each add allocates one above the highest integer
//!   currently present, clamped to a configured lower bound.
//!
//! The indexer is a secondary, reconstructible artifact: readers tolerate
//! dangling entries (a missing record blob reads as "not found") and
//! writers self-heal duplicates via [`Indexer::remove_entry`].
//!
//! [`MetadataStorage`]: sharehub_core::traits::MetadataStorage

pub mod dedup;
pub mod error;
pub mod glob;
pub mod indexer;
pub mod query;
pub mod spec;

pub use dedup::dedup_preserving_order;
pub use error::IndexError;
pub use indexer::{IndexResult, Indexer};
pub use spec::{IndexKind, IndexSpec};
