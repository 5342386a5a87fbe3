//! Manager backend selection.
//!
//! Each manager is constructed from a driver name plus a string-keyed
//! options map. The map is decoded into the backend's typed options
//! struct at construction time, so unknown drivers fail fast and typos in
//! option names fail with a serde error rather than being ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Backend selection for one manager kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Driver name ("metadata", "json", "sql").
    pub driver: String,
    /// Driver-specific options, decoded via [`ManagerConfig::decode`].
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            driver: "metadata".to_string(),
            options: serde_json::Map::new(),
        }
    }
}

impl ManagerConfig {
    /// Create a config with a driver and no options.
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            options: serde_json::Map::new(),
        }
    }

    /// Set a single option value.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Decode the options map into a typed backend options struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(serde_json::Value::Object(self.options.clone())).map_err(|e| {
            AppError::configuration(format!(
                "invalid options for driver '{}': {e}",
                self.driver
            ))
        })
    }
}
