//! # sharehub-storage
//!
//! Implementations of the [`sharehub_core::traits::MetadataStorage`]
//! trait. Currently ships the local filesystem backend; a remote
//! metadata service can slot in behind the same trait.

pub mod providers;

pub use providers::local::LocalMetadataStorage;
