//! Shared domain types: identifiers, permissions, path-segment escaping.

pub mod escape;
pub mod id;
pub mod permissions;

pub use id::{Grantee, GranteeType, GroupId, ResourceId, UserContext, UserId};
pub use permissions::Permissions;
