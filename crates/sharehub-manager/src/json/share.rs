//! Share manager over a single JSON document.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::types::UserContext;
use sharehub_entity::filter::matches_filters;
use sharehub_entity::reference::ShareReference;
use sharehub_entity::share::{
    CreateShareRequest, ReceivedShare, ReceivedShareField, ReceivedShareState, Share, ShareId,
    ShareUpdate,
};
use sharehub_entity::ShareFilter;

use crate::traits::ShareManager;

use super::JsonStore;

/// On-disk document: all shares plus per-recipient state, keyed by
/// share id and then by recipient identity.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ShareDocument {
    #[serde(default)]
    shares: Vec<Share>,
    #[serde(default)]
    states: HashMap<String, HashMap<String, ReceivedShareState>>,
}

impl ShareDocument {
    /// Drop expired shares and their recipient state. Runs at the start
    /// of every access, which is what makes expiry revocation lazy.
    fn purge_expired(&mut self) {
        let now = Utc::now();
        let states = &mut self.states;
        self.shares.retain(|s| {
            let live = !s.is_expired(now);
            if !live {
                states.remove(s.id.as_str());
            }
            live
        });
    }

    fn resolve(&self, reference: &ShareReference) -> AppResult<Share> {
        let found = match reference {
            ShareReference::Id(id) => self.shares.iter().find(|s| s.id == *id),
            ShareReference::Key(key) => {
                let key = key.index_value();
                self.shares.iter().find(|s| s.composite_key() == key)
            }
            ShareReference::Token(_) => {
                return Err(AppError::invalid_argument(
                    "Shares cannot be addressed by token",
                ));
            }
        };
        found
            .cloned()
            .ok_or_else(|| AppError::not_found("Share not found"))
    }

    fn state_for(&self, share: &Share, ctx: &UserContext) -> ReceivedShareState {
        self.states
            .get(share.id.as_str())
            .and_then(|per_user| per_user.get(&ctx.id.index_value()))
            .cloned()
            .unwrap_or_default()
    }
}

fn is_manager(ctx: &UserContext, share: &Share) -> bool {
    share.owner == ctx.id || share.creator == ctx.id
}

fn is_party(ctx: &UserContext, share: &Share) -> bool {
    is_manager(ctx, share) || ctx.matches_grantee(&share.grantee)
}

/// Share manager persisting everything in one JSON file.
#[derive(Debug)]
pub struct JsonShareManager {
    store: JsonStore<ShareDocument>,
}

impl JsonShareManager {
    /// Create a manager backed by the given document path.
    pub fn new(store: JsonStore<ShareDocument>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ShareManager for JsonShareManager {
    async fn create(&self, ctx: &UserContext, request: CreateShareRequest) -> AppResult<Share> {
        if request.grantee.is_user(&request.owner) || request.grantee.is_user(&ctx.id) {
            return Err(AppError::invalid_argument(
                "Cannot share a resource with its owner or creator",
            ));
        }

        let ctx = ctx.clone();
        let share = self
            .store
            .with(move |doc| {
                doc.purge_expired();

                let key = sharehub_entity::share::composite_key(
                    &request.owner,
                    &request.resource_id,
                    &request.grantee,
                );
                if doc.shares.iter().any(|s| s.composite_key() == key) {
                    return Err(AppError::already_exists(
                        "A share for this resource and grantee already exists",
                    ));
                }

                let now = Utc::now();
                let share = Share {
                    id: ShareId::new(),
                    resource_id: request.resource_id,
                    owner: request.owner,
                    creator: ctx.id,
                    grantee: request.grantee,
                    permissions: request.permissions,
                    ctime: now,
                    mtime: now,
                    description: request.description,
                    expiration: request.expiration,
                };
                doc.shares.push(share.clone());
                Ok(share)
            })
            .await?;

        info!(id = %share.id, resource = %share.resource_id, "Created share");
        Ok(share)
    }

    async fn get(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<Share> {
        let ctx = ctx.clone();
        let reference = reference.clone();
        self.store
            .with(move |doc| {
                doc.purge_expired();
                let share = doc.resolve(&reference)?;
                if !is_party(&ctx, &share) {
                    return Err(AppError::not_found("Share not found"));
                }
                Ok(share)
            })
            .await
    }

    async fn update(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        update: ShareUpdate,
    ) -> AppResult<Share> {
        let ctx = ctx.clone();
        let reference = reference.clone();
        let share = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                let current = doc.resolve(&reference)?;
                if !is_manager(&ctx, &current) {
                    return Err(AppError::permission_denied(
                        "Only the owner or creator may modify a share",
                    ));
                }

                let share = doc
                    .shares
                    .iter_mut()
                    .find(|s| s.id == current.id)
                    .ok_or_else(|| AppError::not_found("Share not found"))?;

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
                }
                Ok(share.clone())
            })
            .await?;

        info!(id = %share.id, "Updated share");
        Ok(share)
    }

    async fn unshare(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<()> {
        let ctx = ctx.clone();
        let reference = reference.clone();
        let id = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                let share = doc.resolve(&reference)?;
                if !is_manager(&ctx, &share) {
                    return Err(AppError::permission_denied(
                        "Only the owner or creator may remove a share",
                    ));
                }
                doc.shares.retain(|s| s.id != share.id);
                doc.states.remove(share.id.as_str());
                Ok(share.id)
            })
            .await?;

        info!(%id, "Removed share");
        Ok(())
    }

    async fn list(&self, ctx: &UserContext, filters: &[ShareFilter]) -> AppResult<Vec<Share>> {
        let ctx = ctx.clone();
        let filters = filters.to_vec();
        self.store
            .with(move |doc| {
                doc.purge_expired();
                Ok(doc
                    .shares
                    .iter()
                    .filter(|s| is_manager(&ctx, s))
                    .filter(|s| matches_filters(s, &filters))
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn list_received(
        &self,
        ctx: &UserContext,
        filters: &[ShareFilter],
    ) -> AppResult<Vec<ReceivedShare>> {
        let ctx = ctx.clone();
        let filters = filters.to_vec();
        self.store
            .with(move |doc| {
                doc.purge_expired();
                let shares: Vec<Share> = doc
                    .shares
                    .iter()
                    .filter(|s| ctx.matches_grantee(&s.grantee))
                    .filter(|s| matches_filters(s, &filters))
                    .cloned()
                    .collect();
                Ok(shares
                    .into_iter()
                    .map(|share| {
                        let state = doc.state_for(&share, &ctx);
                        ReceivedShare::merge(share, state)
                    })
                    .collect())
            })
            .await
    }

    async fn get_received(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
    ) -> AppResult<ReceivedShare> {
        let ctx = ctx.clone();
        let reference = reference.clone();
        self.store
            .with(move |doc| {
                doc.purge_expired();
                let share = doc.resolve(&reference)?;
                if !ctx.matches_grantee(&share.grantee) {
                    return Err(AppError::not_found("Share not found"));
                }
                let state = doc.state_for(&share, &ctx);
                Ok(ReceivedShare::merge(share, state))
            })
            .await
    }

    async fn update_received(
        &self,
        ctx: &UserContext,
        received: ReceivedShare,
        fields: &[ReceivedShareField],
    ) -> AppResult<ReceivedShare> {
        let ctx = ctx.clone();
        let fields = fields.to_vec();
        self.store
            .with(move |doc| {
                doc.purge_expired();
                let share = doc.resolve(&ShareReference::Id(received.share.id.clone()))?;
                if !ctx.matches_grantee(&share.grantee) {
                    return Err(AppError::not_found("Share not found"));
                }

                let mut state = doc.state_for(&share, &ctx);
                for field in &fields {
                    match field {
                        ReceivedShareField::State => state.state = received.state,
                        ReceivedShareField::MountPoint => {
                            state.mount_point = received.mount_point.clone();
                        }
                        ReceivedShareField::Hidden => state.hidden = received.hidden,
                        ReceivedShareField::Alias => state.alias = received.alias.clone(),
                    }
                }
                doc.states
                    .entry(share.id.as_str().to_string())
                    .or_default()
                    .insert(ctx.id.index_value(), state.clone());
                Ok(ReceivedShare::merge(share, state))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_core::error::ErrorKind;
    use sharehub_core::types::{Grantee, GroupId, Permissions, ResourceId, UserId};
    use sharehub_entity::share::ShareState;

    fn alice() -> UserContext {
        UserContext::new(UserId::new("idp", "alice"))
    }

    fn bob() -> UserContext {
        UserContext::new(UserId::new("idp", "bob"))
    }

    fn to_bob(resource: &str) -> CreateShareRequest {
        CreateShareRequest {
            resource_id: ResourceId::new("s1", resource),
            owner: UserId::new("idp", "alice"),
            grantee: Grantee::User(UserId::new("idp", "bob")),
            permissions: Permissions::viewer(),
            description: None,
            expiration: None,
        }
    }

    fn manager(dir: &tempfile::TempDir) -> JsonShareManager {
        JsonShareManager::new(JsonStore::new(dir.path().join("shares.json")))
    }

    #[tokio::test]
    async fn test_create_get_unshare() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let created = manager.create(&alice(), to_bob("r1")).await.unwrap();
        let loaded = manager
            .get(&bob(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(loaded, created);

        let err = manager.create(&alice(), to_bob("r1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyExists);

        manager
            .unshare(&alice(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap();
        assert!(manager
            .get(&alice(), &ShareReference::Id(created.id))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_document_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let created = manager(&dir).create(&alice(), to_bob("r1")).await.unwrap();

        // New manager over the same file.
        let reopened = manager(&dir);
        let loaded = reopened
            .get(&alice(), &ShareReference::Id(created.id))
            .await
            .unwrap();
        assert_eq!(loaded.resource_id, ResourceId::new("s1", "r1"));
    }

    #[tokio::test]
    async fn test_received_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let created = manager.create(&alice(), to_bob("r1")).await.unwrap();

        let mut received = manager
            .get_received(&bob(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(received.state, ShareState::Pending);

        received.state = ShareState::Accepted;
        received.alias = Some("docs".to_string());
        manager
            .update_received(
                &bob(),
                received,
                &[ReceivedShareField::State, ReceivedShareField::Alias],
            )
            .await
            .unwrap();

        let listed = manager.list_received(&bob(), &[]).await.unwrap();
        assert_eq!(listed[0].state, ShareState::Accepted);
        assert_eq!(listed[0].alias.as_deref(), Some("docs"));
    }

    #[tokio::test]
    async fn test_expired_purged_on_access() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let mut req = to_bob("r1");
        req.expiration = Some(Utc::now() - chrono::Duration::minutes(1));
        let created = manager.create(&alice(), req).await.unwrap();

        assert!(manager
            .get(&alice(), &ShareReference::Id(created.id))
            .await
            .unwrap_err()
            .is_not_found());

        // And the triple is free again.
        manager.create(&alice(), to_bob("r1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_group_share_visible_to_members() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let request = CreateShareRequest {
            grantee: Grantee::Group(GroupId::new("crew")),
            ..to_bob("r1")
        };
        manager.create(&alice(), request).await.unwrap();

        assert!(manager.list_received(&bob(), &[]).await.unwrap().is_empty());

        let bob_in_crew =
            UserContext::with_groups(UserId::new("idp", "bob"), vec![GroupId::new("crew")]);
        assert_eq!(
            manager.list_received(&bob_in_crew, &[]).await.unwrap().len(),
            1
        );
    }
}
