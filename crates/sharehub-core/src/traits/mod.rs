//! Core traits defined in `sharehub-core` and implemented by other crates.

pub mod indexable;
pub mod storage;

pub use indexable::Indexable;
pub use storage::MetadataStorage;
