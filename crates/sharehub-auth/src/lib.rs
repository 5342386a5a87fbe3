//! # sharehub-auth
//!
//! Credential helpers for public link shares: bcrypt password hashing
//! and the derived HMAC signature capability that lets a link holder
//! skip re-submitting the plaintext password for a bounded window.

pub mod password;
pub mod signature;

pub use password::PasswordHasher;
pub use signature::{add_signature, create_signature, signature_ttl, verify_signature};
