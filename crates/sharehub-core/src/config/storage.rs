//! Metadata storage configuration.

use serde::{Deserialize, Serialize};

/// Metadata storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend type ("local").
    pub backend: String,
    /// Root directory for the local backend.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            root: "/var/lib/sharehub/metadata".to_string(),
        }
    }
}
