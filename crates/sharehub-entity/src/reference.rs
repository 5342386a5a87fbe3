//! Share references: the tagged union callers use to address a share.

use serde::{Deserialize, Serialize};

use sharehub_core::types::{Grantee, ResourceId, UserId};

use crate::share::{composite_key, ShareId};

/// Composite key identifying at most one live share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareKey {
    /// Owner of the resource.
    pub owner: UserId,
    /// The shared resource.
    pub resource_id: ResourceId,
    /// Receiving user or group.
    pub grantee: Grantee,
}

impl ShareKey {
    /// The index value this key resolves through.
    pub fn index_value(&self) -> String {
        composite_key(&self.owner, &self.resource_id, &self.grantee)
    }
}

/// How a caller addresses a share: by opaque id, by composite key, or
/// (for public shares) by token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareReference {
    /// By opaque share id.
    Id(ShareId),
    /// By (owner, resource, grantee) composite key.
    Key(Box<ShareKey>),
    /// By public-link token.
    Token(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_index_value_matches_share_encoding() {
        let key = ShareKey {
            owner: UserId::new("idp", "alice"),
            resource_id: ResourceId::new("s1", "r1"),
            grantee: Grantee::User(UserId::new("idp", "bob")),
        };
        assert_eq!(key.index_value(), "user:idp:alice|s1!r1|user:idp:bob");
    }
}
