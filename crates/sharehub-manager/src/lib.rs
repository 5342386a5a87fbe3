//! # sharehub-manager
//!
//! Persistence managers for user/group shares, public link shares, and
//! federated (OCM) shares. Each manager contract has three backends:
//!
//! - **metadata**: records as individual blobs plus a secondary index
//!   over a [`MetadataStorage`] backend; scales with per-entry access
//!   and self-heals stale index entries.
//! - **json**: one JSON document per manager, mutated under a single
//!   lock; suitable for small single-instance deployments.
//! - **sql**: a sqlx repository; the public-share side is a read-mostly
//!   mirror of an externally populated table.
//!
//! Backends are selected by driver name through the explicit
//! [`ManagerRegistry`]; nothing self-registers.
//!
//! [`MetadataStorage`]: sharehub_core::traits::MetadataStorage

pub mod json;
pub mod metadata;
pub mod ocm;
pub mod registry;
pub mod sql;
pub mod token;
pub mod traits;

pub use registry::ManagerRegistry;
pub use traits::{OcmShareStore, PublicShareManager, ResourceStatter, ShareManager};
