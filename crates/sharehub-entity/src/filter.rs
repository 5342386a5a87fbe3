//! Listing filters.
//!
//! Filters arrive as a flat list of typed predicates. Evaluation groups
//! them by type: filters of the *same* type OR together, groups of
//! *different* types AND together. An empty list matches everything.

use serde::{Deserialize, Serialize};

use sharehub_core::types::{GranteeType, ResourceId, UserId};

use crate::public::PublicShare;
use crate::share::Share;

/// A single typed list predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareFilter {
    /// Match shares of the given resource.
    ResourceId(ResourceId),
    /// Match shares whose grantee is of the given type.
    GranteeType(GranteeType),
    /// Match shares owned by the given user.
    Owner(UserId),
    /// Match shares created by the given user.
    Creator(UserId),
    /// Exclude shares whose permission set encodes a denial.
    ExcludeDenials,
}

impl ShareFilter {
    /// Grouping key: filters with the same kind OR together.
    fn kind(&self) -> FilterKind {
        match self {
            Self::ResourceId(_) => FilterKind::ResourceId,
            Self::GranteeType(_) => FilterKind::GranteeType,
            Self::Owner(_) => FilterKind::Owner,
            Self::Creator(_) => FilterKind::Creator,
            Self::ExcludeDenials => FilterKind::ExcludeDenials,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    ResourceId,
    GranteeType,
    Owner,
    Creator,
    ExcludeDenials,
}

const ALL_KINDS: [FilterKind; 5] = [
    FilterKind::ResourceId,
    FilterKind::GranteeType,
    FilterKind::Owner,
    FilterKind::Creator,
    FilterKind::ExcludeDenials,
];

fn matches_grouped<F>(filters: &[ShareFilter], matches_one: F) -> bool
where
    F: Fn(&ShareFilter) -> Option<bool>,
{
    for kind in ALL_KINDS {
        let mut group_seen = false;
        let mut group_matched = false;
        for filter in filters.iter().filter(|f| f.kind() == kind) {
            // Filters that do not apply to the record type are skipped
            // rather than failing the whole group.
            let Some(matched) = matches_one(filter) else {
                continue;
            };
            group_seen = true;
            group_matched |= matched;
        }
        if group_seen && !group_matched {
            return false;
        }
    }
    true
}

/// Whether a share passes the filter list (AND of per-type OR groups).
pub fn matches_filters(share: &Share, filters: &[ShareFilter]) -> bool {
    matches_grouped(filters, |filter| match filter {
        ShareFilter::ResourceId(id) => Some(share.resource_id == *id),
        ShareFilter::GranteeType(t) => Some(share.grantee.grantee_type() == *t),
        ShareFilter::Owner(u) => Some(share.owner == *u),
        ShareFilter::Creator(u) => Some(share.creator == *u),
        ShareFilter::ExcludeDenials => Some(!share.permissions.is_empty()),
    })
}

/// Whether a public share passes the filter list. Grantee-type filters do
/// not apply to link shares and are ignored.
pub fn matches_public_filters(share: &PublicShare, filters: &[ShareFilter]) -> bool {
    matches_grouped(filters, |filter| match filter {
        ShareFilter::ResourceId(id) => Some(share.resource_id == *id),
        ShareFilter::GranteeType(_) => None,
        ShareFilter::Owner(u) => Some(share.owner == *u),
        ShareFilter::Creator(u) => Some(share.creator == *u),
        ShareFilter::ExcludeDenials => Some(!share.permissions.is_empty()),
    })
}
