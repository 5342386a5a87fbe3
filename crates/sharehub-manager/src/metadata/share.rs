//! Share manager over metadata blobs and the secondary index.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::traits::MetadataStorage;
use sharehub_core::types::{UserContext, UserId};
use sharehub_core::types::escape::escape_segment;
use sharehub_entity::filter::matches_filters;
use sharehub_entity::reference::ShareReference;
use sharehub_entity::share::{
    CreateShareRequest, ReceivedShare, ReceivedShareField, ReceivedShareState, Share, ShareId,
    ShareUpdate,
};
use sharehub_entity::ShareFilter;
use sharehub_indexer::{dedup_preserving_order, IndexSpec, Indexer};

use crate::traits::{ResourceStatter, ShareManager};

use super::{add_with_heal, InitGuard};

const SHARES_DIR: &str = "shares";
const STATE_DIR: &str = "metadata";
const INDEX_CONTAINER: &str = "shares-index";

/// Share manager persisting each share as one blob plus index entries.
#[derive(Debug)]
pub struct MetadataShareManager {
    storage: Arc<dyn MetadataStorage>,
    indexer: Indexer<Share>,
    statter: Arc<dyn ResourceStatter>,
    init: InitGuard,
}

impl MetadataShareManager {
    /// Create a manager over the given storage backend.
    pub fn new(storage: Arc<dyn MetadataStorage>, statter: Arc<dyn ResourceStatter>) -> Self {
        let indexer = Indexer::new(Arc::clone(&storage), INDEX_CONTAINER);
        Self {
            storage,
            indexer,
            statter,
            init: InitGuard::default(),
        }
    }

    async fn ensure_init(&self) -> AppResult<()> {
        self.init
            .ensure(|| async {
                self.storage.init().await?;
                self.storage.make_dir_if_not_exist(SHARES_DIR).await?;
                self.storage.make_dir_if_not_exist(STATE_DIR).await?;

                self.indexer
                    .add_index(IndexSpec::unique("key", |s: &Share| {
                        Some(s.composite_key())
                    }))
                    .await?;
                self.indexer
                    .add_index(IndexSpec::non_unique("owner", |s: &Share| {
                        Some(s.owner.index_value())
                    }))
                    .await?;
                self.indexer
                    .add_index(IndexSpec::non_unique("creator", |s: &Share| {
                        Some(s.creator.index_value())
                    }))
                    .await?;
                self.indexer
                    .add_index(IndexSpec::non_unique("grantee", |s: &Share| {
                        Some(s.grantee.index_value())
                    }))
                    .await?;
                self.indexer
                    .add_index(IndexSpec::non_unique("resource", |s: &Share| {
                        Some(s.resource_id.index_value())
                    }))
                    .await?;
                Ok(())
            })
            .await
    }

    fn share_path(id: &str) -> String {
        format!("{SHARES_DIR}/{id}")
    }

    fn state_path(share_id: &ShareId, user: &UserId) -> String {
        format!(
            "{STATE_DIR}/{}/{}",
            share_id,
            escape_segment(&user.index_value())
        )
    }

    async fn load(&self, id: &str) -> AppResult<Share> {
        let data = self.storage.simple_download(&Self::share_path(id)).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    async fn store(&self, share: &Share) -> AppResult<()> {
        let data = serde_json::to_vec(share)?;
        self.storage
            .simple_upload(&Self::share_path(share.id.as_str()), Bytes::from(data))
            .await
    }

    /// Resolve a reference to a share without authorization.
    async fn resolve(&self, reference: &ShareReference) -> AppResult<Share> {
        match reference {
            ShareReference::Id(id) => self.load(id.as_str()).await,
            ShareReference::Key(key) => {
                let pks = self.indexer.find_by("key", &key.index_value()).await?;
                match pks.first() {
                    Some(pk) => self.load(pk).await,
                    None => Err(AppError::not_found("Share not found")),
                }
            }
            ShareReference::Token(_) => Err(AppError::invalid_argument(
                "Shares cannot be addressed by token",
            )),
        }
    }

    /// Resolve and authorize a read; callers that are not party to the
    /// share learn nothing beyond "not found".
    async fn resolve_for_read(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
    ) -> AppResult<Share> {
        let share = self.resolve(reference).await?;
        if !self.is_party(ctx, &share) {
            return Err(AppError::not_found("Share not found"));
        }
        self.reject_expired(share).await
    }

    /// Resolve and authorize a mutation; only the owner or creator may
    /// mutate.
    async fn resolve_for_write(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
    ) -> AppResult<Share> {
        let share = self.resolve(reference).await?;
        if !self.is_manager(ctx, &share) {
            return Err(AppError::permission_denied(
                "Only the owner or creator may modify a share",
            ));
        }
        self.reject_expired(share).await
    }

    fn is_manager(&self, ctx: &UserContext, share: &Share) -> bool {
        share.owner == ctx.id || share.creator == ctx.id
    }

    fn is_party(&self, ctx: &UserContext, share: &Share) -> bool {
        self.is_manager(ctx, share) || ctx.matches_grantee(&share.grantee)
    }

    async fn reject_expired(&self, share: Share) -> AppResult<Share> {
        if share.is_expired(Utc::now()) {
            self.revoke_expired(&share).await;
            return Err(AppError::not_found("Share not found"));
        }
        Ok(share)
    }

    /// Best-effort removal of an expired share. Failures are logged and
    /// swallowed; the share stays invisible either way and the next
    /// access retries.
    async fn revoke_expired(&self, share: &Share) {
        debug!(id = %share.id, "Revoking expired share");
        if let Err(e) = self.remove_record(share).await {
            warn!(id = %share.id, error = %e, "Failed to revoke expired share");
        }
    }

    /// Delete the blob, index entries, and recipient state of a share.
    /// The blob goes first: if its deletion fails for any reason other
    /// than already-gone, the index is left intact so the share stays
    /// reachable.
    async fn remove_record(&self, share: &Share) -> AppResult<()> {
        match self.storage.delete(&Self::share_path(share.id.as_str())).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.indexer.remove(share).await?;

        // Recipient state is per-user cleanup noise; losing it orphans
        // nothing a reader can reach.
        let state_dir = format!("{STATE_DIR}/{}", share.id);
        match self.storage.read_dir(&state_dir).await {
            Ok(entries) => {
                for entry in entries {
                    if let Err(e) = self.storage.delete(&format!("{state_dir}/{entry}")).await {
                        if !e.is_not_found() {
                            warn!(id = %share.id, error = %e, "Failed to delete recipient state");
                        }
                    }
                }
            }
            Err(e) => warn!(id = %share.id, error = %e, "Failed to list recipient state"),
        }
        Ok(())
    }

    async fn load_state(&self, share_id: &ShareId, user: &UserId) -> AppResult<ReceivedShareState> {
        match self
            .storage
            .simple_download(&Self::state_path(share_id, user))
            .await
        {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.is_not_found() => Ok(ReceivedShareState::default()),
            Err(e) => Err(e),
        }
    }

    /// Load the shares behind a list of primary keys, dropping dangling
    /// index entries and lazily revoking expired records.
    async fn load_live(&self, pks: Vec<String>) -> AppResult<Vec<Share>> {
        let mut shares = Vec::with_capacity(pks.len());
        for pk in pks {
            let share = match self.load(&pk).await {
                Ok(share) => share,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            if share.is_expired(Utc::now()) {
                self.revoke_expired(&share).await;
                continue;
            }
            shares.push(share);
        }
        Ok(shares)
    }
}

#[async_trait]
impl ShareManager for MetadataShareManager {
    async fn create(&self, ctx: &UserContext, request: CreateShareRequest) -> AppResult<Share> {
        self.ensure_init().await?;

        if request.grantee.is_user(&request.owner) || request.grantee.is_user(&ctx.id) {
            return Err(AppError::invalid_argument(
                "Cannot share a resource with its owner or creator",
            ));
        }

        let key =
            sharehub_entity::share::composite_key(&request.owner, &request.resource_id, &request.grantee);
        if let Some(pk) = self.indexer.find_by("key", &key).await?.first() {
            match self.load(pk).await {
                Ok(existing) if !existing.is_expired(Utc::now()) => {
                    return Err(AppError::already_exists(
                        "A share for this resource and grantee already exists",
                    ));
                }
                // Expired occupant: revoke it and take its place.
                Ok(expired) => self.revoke_expired(&expired).await,
                // Stale entry from a crashed delete; healed during add.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let now = Utc::now();
        let share = Share {
            id: ShareId::new(),
            resource_id: request.resource_id,
            owner: request.owner,
            creator: ctx.id.clone(),
            grantee: request.grantee,
            permissions: request.permissions,
            ctime: now,
            mtime: now,
            description: request.description,
            expiration: request.expiration,
        };

        self.store(&share).await?;
        add_with_heal(&self.indexer, &share).await?;

        info!(id = %share.id, resource = %share.resource_id, "Created share");
        Ok(share)
    }

    async fn get(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<Share> {
        self.ensure_init().await?;
        self.resolve_for_read(ctx, reference).await
    }

    async fn update(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        update: ShareUpdate,
    ) -> AppResult<Share> {
        self.ensure_init().await?;
        let mut share = self.resolve_for_write(ctx, reference).await?;

        let mut changed = false;
        if let Some(permissions) = update.permissions {
            changed |= share.permissions != permissions;
            share.permissions = permissions;
        }
        if let Some(expiration) = update.expiration {
            changed |= share.expiration != expiration;
            share.expiration = expiration;
        }
        if let Some(description) = update.description {
            let description = Some(description);
            changed |= share.description != description;
            share.description = description;
        }

        if changed {
            share.mtime = Utc::now();
            self.store(&share).await?;
            info!(id = %share.id, "Updated share");
        }
        Ok(share)
    }

    async fn unshare(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<()> {
        self.ensure_init().await?;
        let share = self.resolve_for_write(ctx, reference).await?;
        self.remove_record(&share).await?;
        info!(id = %share.id, "Removed share");
        Ok(())
    }

    async fn list(&self, ctx: &UserContext, filters: &[ShareFilter]) -> AppResult<Vec<Share>> {
        self.ensure_init().await?;

        let caller = ctx.id.index_value();
        let mut pks = self.indexer.find_by("owner", &caller).await?;
        pks.extend(self.indexer.find_by("creator", &caller).await?);

        // With a resource filter, a caller holding list-grants on that
        // resource sees every grant, not just their own.
        for filter in filters {
            if let ShareFilter::ResourceId(resource) = filter {
                if self.statter.can_list_grants(ctx, resource).await? {
                    pks.extend(
                        self.indexer
                            .find_by("resource", &resource.index_value())
                            .await?,
                    );
                }
            }
        }

        let shares = self.load_live(dedup_preserving_order(pks)).await?;
        Ok(shares
            .into_iter()
            .filter(|s| matches_filters(s, filters))
            .collect())
    }

    async fn list_received(
        &self,
        ctx: &UserContext,
        filters: &[ShareFilter],
    ) -> AppResult<Vec<ReceivedShare>> {
        self.ensure_init().await?;

        let mut pks = self.indexer.find_by("grantee", &ctx.id.index_value()).await?;
        for group in &ctx.groups {
            pks.extend(self.indexer.find_by("grantee", &group.index_value()).await?);
        }

        let shares = self.load_live(dedup_preserving_order(pks)).await?;
        let mut received = Vec::with_capacity(shares.len());
        for share in shares {
            if !matches_filters(&share, filters) {
                continue;
            }
            let state = self.load_state(&share.id, &ctx.id).await?;
            received.push(ReceivedShare::merge(share, state));
        }
        Ok(received)
    }

    async fn get_received(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
    ) -> AppResult<ReceivedShare> {
        self.ensure_init().await?;

        let share = self.resolve(reference).await?;
        if !ctx.matches_grantee(&share.grantee) {
            return Err(AppError::not_found("Share not found"));
        }
        let share = self.reject_expired(share).await?;
        let state = self.load_state(&share.id, &ctx.id).await?;
        Ok(ReceivedShare::merge(share, state))
    }

    async fn update_received(
        &self,
        ctx: &UserContext,
        received: ReceivedShare,
        fields: &[ReceivedShareField],
    ) -> AppResult<ReceivedShare> {
        self.ensure_init().await?;

        let share = self.resolve(&ShareReference::Id(received.share.id.clone())).await?;
        if !ctx.matches_grantee(&share.grantee) {
            return Err(AppError::not_found("Share not found"));
        }
        let share = self.reject_expired(share).await?;

        let mut state = self.load_state(&share.id, &ctx.id).await?;
        for field in fields {
            match field {
                ReceivedShareField::State => state.state = received.state,
                ReceivedShareField::MountPoint => {
                    state.mount_point = received.mount_point.clone();
                }
                ReceivedShareField::Hidden => state.hidden = received.hidden,
                ReceivedShareField::Alias => state.alias = received.alias.clone(),
            }
        }

        let data = serde_json::to_vec(&state)?;
        self.storage
            .simple_upload(&Self::state_path(&share.id, &ctx.id), Bytes::from(data))
            .await?;

        debug!(id = %share.id, user = %ctx.id, "Updated recipient state");
        Ok(ReceivedShare::merge(share, state))
    }
}
