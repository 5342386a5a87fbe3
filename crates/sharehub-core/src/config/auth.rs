//! Password hashing and token settings.

use serde::{Deserialize, Serialize};

/// Authentication-related settings consumed by the managers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bcrypt cost factor for public-link passwords.
    pub bcrypt_cost: u32,
    /// Length of generated public-share tokens.
    pub token_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 12,
            token_length: 15,
        }
    }
}
