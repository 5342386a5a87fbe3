//! # sharehub-core
//!
//! Core crate for ShareHub. Contains the metadata-storage trait,
//! configuration schemas, typed identifiers, permission types,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other ShareHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
