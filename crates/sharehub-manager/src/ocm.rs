//! Federated (OCM) share store over a single JSON document.
//!
//! Unlike the local share managers, OCM records are soft-deleted: the
//! tombstone stays in the document so remote references keep resolving
//! to "gone" rather than "never existed", and the composite key frees
//! up for a fresh share.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::types::UserContext;
use sharehub_entity::ocm::{
    OcmReceivedShare, OcmReceivedShareUpdate, OcmShare, OcmShareUpdate,
};
use sharehub_entity::share::ShareId;

use crate::json::JsonStore;
use crate::traits::OcmShareStore;

/// On-disk document: outgoing and incoming federated shares, tombstones
/// included.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OcmDocument {
    #[serde(default)]
    shares: Vec<OcmShare>,
    #[serde(default)]
    received: Vec<OcmReceivedShare>,
}

impl OcmDocument {
    /// Tombstone expired outgoing shares. Incoming shares are the remote
    /// instance's to expire; we keep serving what it sent us.
    fn tombstone_expired(&mut self) {
        let now = Utc::now();
        for share in &mut self.shares {
            if !share.deleted && share.is_expired(now) {
                share.deleted = true;
            }
        }
    }

    fn live_share(&self, id: &ShareId) -> AppResult<&OcmShare> {
        self.shares
            .iter()
            .find(|s| s.id == *id && !s.deleted)
            .ok_or_else(|| AppError::not_found("OCM share not found"))
    }

    fn live_share_mut(&mut self, id: &ShareId) -> AppResult<&mut OcmShare> {
        self.shares
            .iter_mut()
            .find(|s| s.id == *id && !s.deleted)
            .ok_or_else(|| AppError::not_found("OCM share not found"))
    }
}

fn is_manager(ctx: &UserContext, share: &OcmShare) -> bool {
    share.owner == ctx.id || share.creator == ctx.id
}

/// OCM share store persisting everything in one JSON file.
#[derive(Debug)]
pub struct JsonOcmShareStore {
    store: JsonStore<OcmDocument>,
}

impl JsonOcmShareStore {
    /// Create a store backed by the given document path.
    pub fn new(store: JsonStore<OcmDocument>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OcmShareStore for JsonOcmShareStore {
    async fn store_share(&self, mut share: OcmShare) -> AppResult<OcmShare> {
        let stored = self
            .store
            .with(move |doc| {
                doc.tombstone_expired();

                let key = share.composite_key();
                if doc
                    .shares
                    .iter()
                    .any(|s| !s.deleted && s.composite_key() == key)
                {
                    return Err(AppError::already_exists(
                        "An OCM share for this resource and recipient already exists",
                    ));
                }

                let now = Utc::now();
                share.id = ShareId::new();
                share.ctime = now;
                share.mtime = now;
                share.deleted = false;
                doc.shares.push(share.clone());
                Ok(share)
            })
            .await?;

        info!(id = %stored.id, recipient = %stored.share_with, "Stored OCM share");
        Ok(stored)
    }

    async fn get_share(&self, ctx: &UserContext, id: &ShareId) -> AppResult<OcmShare> {
        let ctx = ctx.clone();
        let id = id.clone();
        self.store
            .with(move |doc| {
                doc.tombstone_expired();
                let share = doc.live_share(&id)?;
                if !is_manager(&ctx, share) {
                    return Err(AppError::not_found("OCM share not found"));
                }
                Ok(share.clone())
            })
            .await
    }

    async fn list_shares(&self, ctx: &UserContext) -> AppResult<Vec<OcmShare>> {
        let ctx = ctx.clone();
        self.store
            .with(move |doc| {
                doc.tombstone_expired();
                Ok(doc
                    .shares
                    .iter()
                    .filter(|s| !s.deleted && is_manager(&ctx, s))
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn update_share(
        &self,
        ctx: &UserContext,
        id: &ShareId,
        update: OcmShareUpdate,
    ) -> AppResult<OcmShare> {
        let ctx = ctx.clone();
        let id = id.clone();
        let share = self
            .store
            .with(move |doc| {
                doc.tombstone_expired();
                if !is_manager(&ctx, doc.live_share(&id)?) {
                    return Err(AppError::permission_denied(
                        "Only the owner or creator may modify an OCM share",
                    ));
                }

                let share = doc.live_share_mut(&id)?;
                let mut changed = false;
                if let Some(access_methods) = update.access_methods {
                    changed |= share.access_methods != access_methods;
                    share.access_methods = access_methods;
                }
                if let Some(expiration) = update.expiration {
                    changed |= share.expiration != expiration;
                    share.expiration = expiration;
                }
                if changed {
                    share.mtime = Utc::now();
                }
                Ok(share.clone())
            })
            .await?;

        info!(id = %share.id, "Updated OCM share");
        Ok(share)
    }

    async fn delete_share(&self, ctx: &UserContext, id: &ShareId) -> AppResult<()> {
        let ctx = ctx.clone();
        let share_id = id.clone();
        self.store
            .with(move |doc| {
                doc.tombstone_expired();
                if !is_manager(&ctx, doc.live_share(&share_id)?) {
                    return Err(AppError::permission_denied(
                        "Only the owner or creator may delete an OCM share",
                    ));
                }
                let share = doc.live_share_mut(&share_id)?;
                share.deleted = true;
                share.mtime = Utc::now();
                Ok(())
            })
            .await?;

        info!(%id, "Deleted OCM share");
        Ok(())
    }

    async fn store_received_share(
        &self,
        mut share: OcmReceivedShare,
    ) -> AppResult<OcmReceivedShare> {
        let stored = self
            .store
            .with(move |doc| {
                let key = share.composite_key();
                if doc
                    .received
                    .iter()
                    .any(|s| !s.deleted && s.composite_key() == key)
                {
                    return Err(AppError::already_exists(
                        "This remote share was already received",
                    ));
                }

                let now = Utc::now();
                share.id = ShareId::new();
                share.ctime = now;
                share.mtime = now;
                share.deleted = false;
                doc.received.push(share.clone());
                Ok(share)
            })
            .await?;

        info!(id = %stored.id, remote = %stored.remote_share_id, "Stored received OCM share");
        Ok(stored)
    }

    async fn get_received_share(
        &self,
        ctx: &UserContext,
        id: &ShareId,
    ) -> AppResult<OcmReceivedShare> {
        let ctx = ctx.clone();
        let id = id.clone();
        self.store
            .read(move |doc| {
                doc.received
                    .iter()
                    .find(|s| s.id == id && !s.deleted && s.share_with == ctx.id)
                    .cloned()
                    .ok_or_else(|| AppError::not_found("OCM share not found"))
            })
            .await
    }

    async fn list_received_shares(&self, ctx: &UserContext) -> AppResult<Vec<OcmReceivedShare>> {
        let ctx = ctx.clone();
        self.store
            .read(move |doc| {
                Ok(doc
                    .received
                    .iter()
                    .filter(|s| !s.deleted && s.share_with == ctx.id)
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn update_received_share(
        &self,
        ctx: &UserContext,
        id: &ShareId,
        update: OcmReceivedShareUpdate,
    ) -> AppResult<OcmReceivedShare> {
        let ctx = ctx.clone();
        let id = id.clone();
        let share = self
            .store
            .with(move |doc| {
                let share = doc
                    .received
                    .iter_mut()
                    .find(|s| s.id == id && !s.deleted && s.share_with == ctx.id)
                    .ok_or_else(|| AppError::not_found("OCM share not found"))?;

                if let Some(state) = update.state {
                    if share.state != state {
                        share.state = state;
                        share.mtime = Utc::now();
                    }
                }
                Ok(share.clone())
            })
            .await?;

        info!(id = %share.id, "Updated received OCM share");
        Ok(share)
    }
}
