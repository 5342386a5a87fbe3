//! Share permission sets.

use serde::{Deserialize, Serialize};

/// Capabilities granted by a share.
///
/// Serialized field names are the canonical wire names; absent fields
/// default to `false` so older blobs keep deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    /// Stat the resource.
    pub stat: bool,
    /// List the resource's children.
    pub list_container: bool,
    /// Download file content.
    pub initiate_file_download: bool,
    /// Upload file content.
    pub initiate_file_upload: bool,
    /// Create child containers.
    pub create_container: bool,
    /// Delete the resource or children.
    pub delete: bool,
    /// List grants on the resource.
    pub list_grants: bool,
    /// Add grants (re-share).
    pub add_grant: bool,
    /// Remove grants.
    pub remove_grant: bool,
}

impl Permissions {
    /// Read-only access: stat, list, download.
    pub fn viewer() -> Self {
        Self {
            stat: true,
            list_container: true,
            initiate_file_download: true,
            ..Self::default()
        }
    }

    /// Read-write access without grant management.
    pub fn editor() -> Self {
        Self {
            stat: true,
            list_container: true,
            initiate_file_download: true,
            initiate_file_upload: true,
            create_container: true,
            delete: true,
            ..Self::default()
        }
    }

    /// Full access including grant management.
    pub fn manager() -> Self {
        Self {
            stat: true,
            list_container: true,
            initiate_file_download: true,
            initiate_file_upload: true,
            create_container: true,
            delete: true,
            list_grants: true,
            add_grant: true,
            remove_grant: true,
        }
    }

    /// Whether no capability is granted. An all-false permission set on a
    /// share encodes a denial.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
