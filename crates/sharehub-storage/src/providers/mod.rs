//! Metadata storage provider implementations.

pub mod local;
