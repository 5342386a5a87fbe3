//! OCM (Open Cloud Mesh) federated share records.
//!
//! Remote shares carry a list of access methods (outgoing) or protocols
//! (incoming), each with its own permission encoding. Records are
//! soft-deleted: tombstones keep the composite key occupied history out
//! of uniqueness checks while references may still exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sharehub_core::types::{Permissions, ResourceId, UserId};

use crate::share::{ShareId, ShareState};

/// View mode for web-app access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// View-only rendering.
    ViewOnly,
    /// Read access.
    Read,
    /// Read/write access.
    Write,
}

/// How a remote recipient may access an outgoing federated share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessMethod {
    /// WebDAV access with a share-level permission set.
    Webdav {
        /// Capabilities granted over WebDAV.
        permissions: Permissions,
    },
    /// Web-app access with a view mode.
    Webapp {
        /// Granted view mode.
        view_mode: ViewMode,
    },
    /// One-shot data transfer.
    Transfer,
}

/// Concrete protocol endpoints of an incoming federated share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Protocol {
    /// WebDAV endpoint.
    Webdav {
        /// Endpoint URI.
        uri: String,
        /// Bearer secret for the endpoint.
        shared_secret: String,
        /// Capabilities granted by the remote end.
        permissions: Permissions,
    },
    /// Web-app endpoint.
    Webapp {
        /// URI template for opening the resource.
        uri_template: String,
        /// Granted view mode.
        view_mode: ViewMode,
    },
    /// Transfer endpoint.
    Transfer {
        /// Source URI to pull from.
        source_uri: String,
        /// Bearer secret for the pull.
        shared_secret: String,
        /// Payload size in bytes.
        size: u64,
    },
}

/// An outgoing federated share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcmShare {
    /// Unique share identifier.
    pub id: ShareId,
    /// Secret token the remote instance presents.
    pub token: String,
    /// Display name of the shared resource.
    pub name: String,
    /// The shared resource.
    pub resource_id: ResourceId,
    /// Owner of the resource; the owner's idp is the owning instance.
    pub owner: UserId,
    /// User who created the share.
    pub creator: UserId,
    /// Remote recipient (user at another instance).
    pub share_with: UserId,
    /// Granted access methods.
    pub access_methods: Vec<AccessMethod>,
    /// Creation time.
    pub ctime: DateTime<Utc>,
    /// Last modification time.
    pub mtime: DateTime<Utc>,
    /// Optional expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Soft-delete tombstone; deleted records are never returned and do
    /// not participate in uniqueness checks.
    #[serde(default)]
    pub deleted: bool,
}

impl OcmShare {
    /// Composite-uniqueness key:
    /// (owner instance, storage, file, remote recipient).
    pub fn composite_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.owner.idp,
            self.resource_id.storage_id,
            self.resource_id.opaque_id,
            self.share_with.index_value()
        )
    }

    /// Whether the share has expired at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}

/// An incoming federated share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcmReceivedShare {
    /// Local identifier.
    pub id: ShareId,
    /// Identifier of the share at the owning instance.
    pub remote_share_id: String,
    /// Display name of the shared resource.
    pub name: String,
    /// Remote owner; the owner's idp is the owning instance.
    pub owner: UserId,
    /// Remote user who created the share.
    pub creator: UserId,
    /// Local recipient.
    pub share_with: UserId,
    /// Protocols offered by the remote instance.
    pub protocols: Vec<Protocol>,
    /// Accept/reject state of the local recipient.
    #[serde(default)]
    pub state: ShareState,
    /// Creation time.
    pub ctime: DateTime<Utc>,
    /// Last modification time.
    pub mtime: DateTime<Utc>,
    /// Optional expiration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Soft-delete tombstone.
    #[serde(default)]
    pub deleted: bool,
}

impl OcmReceivedShare {
    /// Composite-uniqueness key mirroring [`OcmShare::composite_key`],
    /// keyed by the remote share's origin.
    pub fn composite_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.owner.idp,
            self.remote_share_id,
            self.share_with.index_value()
        )
    }
}

/// Field-mask-constrained partial update of an outgoing federated share.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcmShareUpdate {
    /// Replace the access method list.
    pub access_methods: Option<Vec<AccessMethod>>,
    /// New expiration; `Some(None)` clears it.
    pub expiration: Option<Option<DateTime<Utc>>>,
}

/// Field-mask-constrained partial update of an incoming federated share.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcmReceivedShareUpdate {
    /// New accept/reject state.
    pub state: Option<ShareState>,
}
