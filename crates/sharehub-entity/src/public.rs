//! Public link share entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sharehub_core::types::{Permissions, ResourceId, UserId};

use crate::share::ShareId;

/// A time-boxed capability derived from a public share's token and
/// hashed password, letting a client skip re-submitting the plaintext
/// password within the validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Hex-encoded HMAC value.
    pub signature: String,
    /// Instant after which the signature is rejected.
    pub expiration: DateTime<Utc>,
}

/// A token-addressed public link share.
///
/// The hashed password is **not** part of this struct; it lives only in
/// the [`PersistedPublicShare`] envelope so a plain share serialization
/// can never leak password material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicShare {
    /// Numeric-looking opaque id, allocated by the backend.
    pub id: ShareId,
    /// Unguessable token; the lookup key for link holders.
    pub token: String,
    /// The shared resource.
    pub resource_id: ResourceId,
    /// Owner of the resource.
    pub owner: UserId,
    /// User who created the link.
    pub creator: UserId,
    /// Capabilities granted to link holders.
    pub permissions: Permissions,
    /// Creation time.
    pub ctime: DateTime<Utc>,
    /// Last modification time.
    pub mtime: DateTime<Utc>,
    /// Display name shown to link holders.
    #[serde(default)]
    pub display_name: String,
    /// Whether a password is required. Invariant:
    /// `password_protected == !hashed_password.is_empty()` in the envelope.
    #[serde(default)]
    pub password_protected: bool,
    /// Optional expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Derived, time-boxed signature; attached on request, never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl PublicShare {
    /// Whether the link has expired at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}

/// The persisted envelope: the public share record nested under one key
/// and the bcrypt hash under a sibling key, never flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedPublicShare {
    /// The public share record.
    pub share: PublicShare,
    /// Bcrypt hash of the link password; empty when unprotected.
    #[serde(default)]
    pub password: String,
}

impl PersistedPublicShare {
    /// Wrap a share with an optional password hash, keeping the
    /// `password_protected` flag in sync.
    pub fn new(mut share: PublicShare, password_hash: Option<String>) -> Self {
        let password = password_hash.unwrap_or_default();
        share.password_protected = !password.is_empty();
        Self { share, password }
    }
}

impl sharehub_core::traits::Indexable for PersistedPublicShare {
    fn type_name() -> &'static str {
        "public_share"
    }

    fn primary_key(&self) -> String {
        self.share.token.clone()
    }
}

/// Request to create a new public share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePublicShareRequest {
    /// The resource to link.
    pub resource_id: ResourceId,
    /// Owner of the resource.
    pub owner: UserId,
    /// Capabilities granted to link holders.
    pub permissions: Permissions,
    /// Plaintext password to protect the link with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Optional expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

/// Fields of a public share that an update may touch. `Some(None)` on a
/// double-option clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicShareUpdate {
    /// New display name.
    pub display_name: Option<String>,
    /// New permissions.
    pub permissions: Option<Permissions>,
    /// New expiration; `Some(None)` clears it.
    pub expiration: Option<Option<DateTime<Utc>>>,
    /// New plaintext password; `Some(None)` removes protection.
    pub password: Option<Option<String>>,
}

/// How a link holder authenticates against a password-protected share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicShareAuthentication {
    /// Plaintext password, verified against the stored hash.
    Password(String),
    /// Previously issued signature, verified without the password.
    Signature(Signature),
}
