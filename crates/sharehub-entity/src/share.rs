//! Share entity model and per-recipient received state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sharehub_core::types::{Grantee, Permissions, ResourceId, UserId};

/// Opaque share identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(pub String);

impl ShareId {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ShareId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A grant of access to a resource, given to a user or group.
///
/// Shares are immutable from the recipient's perspective; per-recipient
/// mutable state lives in [`ReceivedShareState`], keyed separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Unique share identifier.
    pub id: ShareId,
    /// The shared resource.
    pub resource_id: ResourceId,
    /// Owner of the resource.
    pub owner: UserId,
    /// User who created the share (may differ from the owner).
    pub creator: UserId,
    /// Receiving user or group.
    pub grantee: Grantee,
    /// Capabilities granted.
    pub permissions: Permissions,
    /// Creation time.
    pub ctime: DateTime<Utc>,
    /// Last modification time.
    pub mtime: DateTime<Utc>,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional expiration; expired shares are never returned and are
    /// lazily revoked on next access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

impl Share {
    /// Composite-uniqueness key value: at most one live share per
    /// (owner, resource, grantee) triple.
    pub fn composite_key(&self) -> String {
        composite_key(&self.owner, &self.resource_id, &self.grantee)
    }

    /// Whether the share has expired at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}

impl sharehub_core::traits::Indexable for Share {
    fn type_name() -> &'static str {
        "share"
    }

    fn primary_key(&self) -> String {
        self.id.0.clone()
    }
}

/// Derive the composite-uniqueness index value for a share key.
pub fn composite_key(owner: &UserId, resource_id: &ResourceId, grantee: &Grantee) -> String {
    format!(
        "{}|{}|{}",
        owner.index_value(),
        resource_id.index_value(),
        grantee.index_value()
    )
}

/// Recipient-side lifecycle state of a share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareState {
    /// Not yet accepted or rejected.
    #[default]
    Pending,
    /// Accepted into the recipient's namespace.
    Accepted,
    /// Rejected; may be re-accepted later.
    Rejected,
}

/// Per-recipient mutable state, stored separately from the share blob so
/// the owner and multiple recipients never contend on the same path.
///
/// Created lazily on first mutation; absent state reads as the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceivedShareState {
    /// Accept/reject state; defaults to pending.
    #[serde(default)]
    pub state: ShareState,
    /// Where the recipient mounted the share.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    /// Whether the recipient hid the share from listings.
    #[serde(default)]
    pub hidden: bool,
    /// Recipient-chosen display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A share as seen by its recipient: the immutable share merged with the
/// recipient's own state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedShare {
    /// The underlying share.
    pub share: Share,
    /// Accept/reject state.
    pub state: ShareState,
    /// Recipient's mount point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    /// Whether the recipient hid the share.
    #[serde(default)]
    pub hidden: bool,
    /// Recipient-chosen display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ReceivedShare {
    /// Merge a share with its per-recipient state.
    pub fn merge(share: Share, state: ReceivedShareState) -> Self {
        Self {
            share,
            state: state.state,
            mount_point: state.mount_point,
            hidden: state.hidden,
            alias: state.alias,
        }
    }

    /// Extract the per-recipient state for persistence.
    pub fn recipient_state(&self) -> ReceivedShareState {
        ReceivedShareState {
            state: self.state,
            mount_point: self.mount_point.clone(),
            hidden: self.hidden,
            alias: self.alias.clone(),
        }
    }
}

/// Fields of a received share that an update may touch. Updates name
/// their fields explicitly; unnamed fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivedShareField {
    /// Accept/reject state.
    State,
    /// Mount point.
    MountPoint,
    /// Hidden flag.
    Hidden,
    /// Display alias.
    Alias,
}

/// Fields of a share that an update may touch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareUpdate {
    /// New permissions, if named in the mask.
    pub permissions: Option<Permissions>,
    /// New expiration; `Some(None)` clears it.
    pub expiration: Option<Option<DateTime<Utc>>>,
    /// New description.
    pub description: Option<String>,
}

/// Request to create a new share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShareRequest {
    /// The resource to share.
    pub resource_id: ResourceId,
    /// Owner of the resource.
    pub owner: UserId,
    /// Receiving user or group.
    pub grantee: Grantee,
    /// Capabilities to grant.
    pub permissions: Permissions,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}
