//! Typed identifiers for resources, users, groups, and grantees.
//!
//! Every identifier that participates in an index has a stable
//! `index_value()` encoding. These strings are what the indexer persists,
//! so changing an encoding invalidates existing on-disk indexes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a shared resource: a storage provider plus an opaque id
/// within that provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// Storage provider id.
    pub storage_id: String,
    /// Opaque resource id within the provider.
    pub opaque_id: String,
}

impl ResourceId {
    /// Create a resource id from its two components.
    pub fn new(storage_id: impl Into<String>, opaque_id: impl Into<String>) -> Self {
        Self {
            storage_id: storage_id.into(),
            opaque_id: opaque_id.into(),
        }
    }

    /// Stable encoding used as an index value.
    pub fn index_value(&self) -> String {
        format!("{}!{}", self.storage_id, self.opaque_id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.storage_id, self.opaque_id)
    }
}

/// Identifies a user: identity provider plus opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId {
    /// Identity provider that issued the id.
    pub idp: String,
    /// Opaque user id within the provider.
    pub opaque_id: String,
}

impl UserId {
    /// Create a user id from its two components.
    pub fn new(idp: impl Into<String>, opaque_id: impl Into<String>) -> Self {
        Self {
            idp: idp.into(),
            opaque_id: opaque_id.into(),
        }
    }

    /// Stable encoding used as an index value.
    pub fn index_value(&self) -> String {
        format!("user:{}:{}", self.idp, self.opaque_id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.idp, self.opaque_id)
    }
}

/// Identifies a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId {
    /// Opaque group id.
    pub opaque_id: String,
}

impl GroupId {
    /// Create a group id.
    pub fn new(opaque_id: impl Into<String>) -> Self {
        Self {
            opaque_id: opaque_id.into(),
        }
    }

    /// Stable encoding used as an index value.
    pub fn index_value(&self) -> String {
        format!("group:{}", self.opaque_id)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opaque_id)
    }
}

/// The receiving side of a share: either a single user or a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grantee {
    /// Share granted to a single user.
    User(UserId),
    /// Share granted to every member of a group.
    Group(GroupId),
}

impl Grantee {
    /// Stable encoding used as an index value and as a path segment
    /// (after escaping).
    pub fn index_value(&self) -> String {
        match self {
            Self::User(u) => u.index_value(),
            Self::Group(g) => g.index_value(),
        }
    }

    /// The grantee's type tag, used by filters.
    pub fn grantee_type(&self) -> GranteeType {
        match self {
            Self::User(_) => GranteeType::User,
            Self::Group(_) => GranteeType::Group,
        }
    }

    /// Whether this grantee denotes the given user directly.
    pub fn is_user(&self, user: &UserId) -> bool {
        matches!(self, Self::User(u) if u == user)
    }
}

/// Discriminant of a [`Grantee`], used in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GranteeType {
    /// A single-user grantee.
    User,
    /// A group grantee.
    Group,
}

/// The authenticated caller of a manager operation.
///
/// Group membership is resolved by the identity layer before the call;
/// managers only consume the resolved list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// The caller's user id.
    pub id: UserId,
    /// Groups the caller belongs to.
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

impl UserContext {
    /// Create a context without group memberships.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            groups: Vec::new(),
        }
    }

    /// Create a context with group memberships.
    pub fn with_groups(id: UserId, groups: Vec<GroupId>) -> Self {
        Self { id, groups }
    }

    /// Whether the given grantee matches this caller, either directly or
    /// through one of the caller's groups.
    pub fn matches_grantee(&self, grantee: &Grantee) -> bool {
        match grantee {
            Grantee::User(u) => *u == self.id,
            Grantee::Group(g) => self.groups.contains(g),
        }
    }
}
