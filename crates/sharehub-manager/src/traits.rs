//! Manager contracts implemented by each backend.

use async_trait::async_trait;

use sharehub_core::result::AppResult;
use sharehub_core::types::{ResourceId, UserContext};
use sharehub_entity::ocm::{
    OcmReceivedShare, OcmReceivedShareUpdate, OcmShare, OcmShareUpdate,
};
use sharehub_entity::public::{
    CreatePublicShareRequest, PublicShare, PublicShareAuthentication, PublicShareUpdate,
};
use sharehub_entity::reference::ShareReference;
use sharehub_entity::share::{
    CreateShareRequest, ReceivedShare, ReceivedShareField, Share, ShareId, ShareUpdate,
};
use sharehub_entity::ShareFilter;

/// Persistence manager for user/group shares.
///
/// All operations take the authenticated caller. Reads a caller is not
/// party to fail with `NotFound` (never `PermissionDenied`), so an
/// unauthorized probe cannot distinguish "absent" from "hidden".
/// Mutations require the owner or creator and fail `PermissionDenied`
/// otherwise. Expired shares behave as absent and are lazily revoked.
#[async_trait]
pub trait ShareManager: Send + Sync + std::fmt::Debug + 'static {
    /// Create a share. Fails `AlreadyExists` if a live share for the
    /// same (owner, resource, grantee) triple exists, and
    /// `InvalidArgument` if the grantee is the owner or creator.
    async fn create(&self, ctx: &UserContext, request: CreateShareRequest) -> AppResult<Share>;

    /// Resolve a share by id or composite key.
    async fn get(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<Share>;

    /// Apply a field-masked update; `mtime` refreshes only when a named
    /// field actually changes the record.
    async fn update(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        update: ShareUpdate,
    ) -> AppResult<Share>;

    /// Remove a share and its index entries. Tolerates a record blob
    /// that is already gone.
    async fn unshare(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<()>;

    /// List shares the caller owns or created, filtered.
    async fn list(&self, ctx: &UserContext, filters: &[ShareFilter]) -> AppResult<Vec<Share>>;

    /// List shares granted to the caller directly or through one of the
    /// caller's groups, merged with the caller's per-recipient state.
    async fn list_received(
        &self,
        ctx: &UserContext,
        filters: &[ShareFilter],
    ) -> AppResult<Vec<ReceivedShare>>;

    /// Resolve a single received share for the caller.
    async fn get_received(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
    ) -> AppResult<ReceivedShare>;

    /// Persist the caller's per-recipient state for the named fields
    /// only; unnamed fields keep their stored values.
    async fn update_received(
        &self,
        ctx: &UserContext,
        received: ReceivedShare,
        fields: &[ReceivedShareField],
    ) -> AppResult<ReceivedShare>;
}

/// Persistence manager for public link shares.
#[async_trait]
pub trait PublicShareManager: Send + Sync + std::fmt::Debug + 'static {
    /// Create a link share; allocates the numeric id and the token.
    async fn create(
        &self,
        ctx: &UserContext,
        request: CreatePublicShareRequest,
    ) -> AppResult<PublicShare>;

    /// Resolve a link share by id or token, as its owner or creator.
    /// With `sign`, password-protected shares carry a fresh signature.
    async fn get(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        sign: bool,
    ) -> AppResult<PublicShare>;

    /// Resolve a link share as an anonymous link holder. Protected
    /// shares require a password or a previously issued signature.
    async fn get_by_token(
        &self,
        token: &str,
        authentication: Option<&PublicShareAuthentication>,
        sign: bool,
    ) -> AppResult<PublicShare>;

    /// Apply a field-masked update. A password update re-hashes and
    /// flips the protection flag; `Some(None)` removes protection.
    async fn update(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        update: PublicShareUpdate,
    ) -> AppResult<PublicShare>;

    /// Remove a link share and its index entries.
    async fn revoke(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<()>;

    /// List link shares the caller owns or created, filtered.
    async fn list(
        &self,
        ctx: &UserContext,
        filters: &[ShareFilter],
        sign: bool,
    ) -> AppResult<Vec<PublicShare>>;
}

/// Store for federated (OCM) share records.
///
/// Records are soft-deleted: tombstones stay on disk, are never
/// returned, and do not count against composite-key uniqueness.
#[async_trait]
pub trait OcmShareStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist an outgoing federated share.
    async fn store_share(&self, share: OcmShare) -> AppResult<OcmShare>;

    /// Resolve an outgoing share by id, as owner or creator.
    async fn get_share(&self, ctx: &UserContext, id: &ShareId) -> AppResult<OcmShare>;

    /// List live outgoing shares the caller owns or created.
    async fn list_shares(&self, ctx: &UserContext) -> AppResult<Vec<OcmShare>>;

    /// Apply a field-masked update to an outgoing share.
    async fn update_share(
        &self,
        ctx: &UserContext,
        id: &ShareId,
        update: OcmShareUpdate,
    ) -> AppResult<OcmShare>;

    /// Soft-delete an outgoing share.
    async fn delete_share(&self, ctx: &UserContext, id: &ShareId) -> AppResult<()>;

    /// Persist an incoming federated share.
    async fn store_received_share(&self, share: OcmReceivedShare)
        -> AppResult<OcmReceivedShare>;

    /// Resolve an incoming share by id, as its local recipient.
    async fn get_received_share(
        &self,
        ctx: &UserContext,
        id: &ShareId,
    ) -> AppResult<OcmReceivedShare>;

    /// List live incoming shares for the caller.
    async fn list_received_shares(&self, ctx: &UserContext) -> AppResult<Vec<OcmReceivedShare>>;

    /// Apply a field-masked update to an incoming share.
    async fn update_received_share(
        &self,
        ctx: &UserContext,
        id: &ShareId,
        update: OcmReceivedShareUpdate,
    ) -> AppResult<OcmReceivedShare>;
}

/// Resolves whether a caller may see *all* grants on a resource, not
/// just their own. Backed by the storage provider's stat call in a full
/// deployment; injectable so tests can exercise both branches.
#[async_trait]
pub trait ResourceStatter: Send + Sync + std::fmt::Debug + 'static {
    /// Whether the caller holds list-grants permission on the resource.
    async fn can_list_grants(&self, ctx: &UserContext, resource: &ResourceId) -> AppResult<bool>;
}

/// Statter that never grants list-grants; the safe default when no
/// storage provider is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllStatter;

#[async_trait]
impl ResourceStatter for DenyAllStatter {
    async fn can_list_grants(
        &self,
        _ctx: &UserContext,
        _resource: &ResourceId,
    ) -> AppResult<bool> {
        Ok(false)
    }
}
