//! Public link share manager over a single JSON document.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use sharehub_auth::{add_signature, verify_signature, PasswordHasher};
use sharehub_core::config::auth::AuthConfig;
use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::types::UserContext;
use sharehub_entity::filter::matches_public_filters;
use sharehub_entity::public::{
    CreatePublicShareRequest, PersistedPublicShare, PublicShare, PublicShareAuthentication,
    PublicShareUpdate,
};
use sharehub_entity::reference::ShareReference;
use sharehub_entity::share::ShareId;
use sharehub_entity::ShareFilter;

use crate::token::generate_token;
use crate::traits::PublicShareManager;

use super::JsonStore;

fn first_id() -> i64 {
    1
}

/// On-disk document: all link shares plus the id counter.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicShareDocument {
    #[serde(default)]
    shares: Vec<PersistedPublicShare>,
    /// Next id to allocate; never decremented, so revoked ids are not
    /// reused.
    #[serde(default = "first_id")]
    next_id: i64,
}

impl Default for PublicShareDocument {
    fn default() -> Self {
        Self {
            shares: Vec::new(),
            next_id: first_id(),
        }
    }
}

impl PublicShareDocument {
    fn purge_expired(&mut self) {
        let now = Utc::now();
        self.shares.retain(|s| !s.share.is_expired(now));
    }

    fn resolve(&self, reference: &ShareReference) -> AppResult<PersistedPublicShare> {
        let found = match reference {
            ShareReference::Id(id) => self.shares.iter().find(|s| s.share.id == *id),
            ShareReference::Token(token) => {
                self.shares.iter().find(|s| s.share.token == *token)
            }
            ShareReference::Key(_) => {
                return Err(AppError::invalid_argument(
                    "Public shares cannot be addressed by composite key",
                ));
            }
        };
        found
            .cloned()
            .ok_or_else(|| AppError::not_found("Public share not found"))
    }
}

fn is_manager(ctx: &UserContext, share: &PublicShare) -> bool {
    share.owner == ctx.id || share.creator == ctx.id
}

fn sign_if_requested(persisted: &PersistedPublicShare, sign: bool) -> AppResult<PublicShare> {
    let mut share = persisted.share.clone();
    if sign && share.password_protected {
        add_signature(&mut share, &persisted.password)?;
    }
    Ok(share)
}

/// Public share manager persisting everything in one JSON file.
#[derive(Debug)]
pub struct JsonPublicShareManager {
    store: JsonStore<PublicShareDocument>,
    hasher: PasswordHasher,
    token_length: usize,
}

impl JsonPublicShareManager {
    /// Create a manager backed by the given document path.
    pub fn new(store: JsonStore<PublicShareDocument>, auth: &AuthConfig) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(auth.bcrypt_cost),
            token_length: auth.token_length,
        }
    }
}

#[async_trait]
impl PublicShareManager for JsonPublicShareManager {
    async fn create(
        &self,
        ctx: &UserContext,
        request: CreatePublicShareRequest,
    ) -> AppResult<PublicShare> {
        // Hashing is async; do it before entering the locked closure.
        let password_hash = match &request.password {
            Some(password) => Some(self.hasher.hash(password).await?),
            None => None,
        };
        let token = generate_token(self.token_length);
        let ctx = ctx.clone();

        let share = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                if doc.shares.iter().any(|s| s.share.token == token) {
                    return Err(AppError::internal("Generated link token collides"));
                }

                let now = Utc::now();
                let share = PublicShare {
                    id: ShareId::from_string(doc.next_id.to_string()),
                    token,
                    resource_id: request.resource_id,
                    owner: request.owner,
                    creator: ctx.id,
                    permissions: request.permissions,
                    ctime: now,
                    mtime: now,
                    display_name: request.display_name,
                    password_protected: false,
                    expiration: request.expiration,
                    signature: None,
                };
                doc.next_id += 1;
                let persisted = PersistedPublicShare::new(share, password_hash);
                doc.shares.push(persisted.clone());
                Ok(persisted.share)
            })
            .await?;

        info!(id = %share.id, token = %share.token, "Created public share");
        Ok(share)
    }

    async fn get(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        sign: bool,
    ) -> AppResult<PublicShare> {
        let ctx = ctx.clone();
        let reference = reference.clone();
        let persisted = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                let persisted = doc.resolve(&reference)?;
                if !is_manager(&ctx, &persisted.share) {
                    return Err(AppError::not_found("Public share not found"));
                }
                Ok(persisted)
            })
            .await?;
        sign_if_requested(&persisted, sign)
    }

    async fn get_by_token(
        &self,
        token: &str,
        authentication: Option<&PublicShareAuthentication>,
        sign: bool,
    ) -> AppResult<PublicShare> {
        let reference = ShareReference::Token(token.to_string());
        let persisted = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                doc.resolve(&reference)
            })
            .await?;

        // Bcrypt verification is async; run it outside the lock.
        if persisted.share.password_protected {
            match authentication {
                Some(PublicShareAuthentication::Password(password)) => {
                    self.hasher.verify(password, &persisted.password).await?;
                }
                Some(PublicShareAuthentication::Signature(signature)) => {
                    verify_signature(token, &persisted.password, signature)?;
                }
                None => {
                    return Err(AppError::invalid_credentials(
                        "Public share requires a password",
                    ));
                }
            }
        }
        sign_if_requested(&persisted, sign)
    }

    async fn update(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        update: PublicShareUpdate,
    ) -> AppResult<PublicShare> {
        let password_hash = match update.password {
            Some(Some(ref plaintext)) => Some(self.hasher.hash(plaintext).await?),
            Some(None) => Some(String::new()),
            None => None,
        };
        let ctx = ctx.clone();
        let reference = reference.clone();

        let share = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                let current = doc.resolve(&reference)?;
                if !is_manager(&ctx, &current.share) {
                    return Err(AppError::permission_denied(
                        "Only the owner or creator may modify a public share",
                    ));
                }

                let persisted = doc
                    .shares
                    .iter_mut()
                    .find(|s| s.share.id == current.share.id)
                    .ok_or_else(|| AppError::not_found("Public share not found"))?;

                let mut changed = false;
                if let Some(display_name) = update.display_name {
                    changed |= persisted.share.display_name != display_name;
                    persisted.share.display_name = display_name;
                }
                if let Some(permissions) = update.permissions {
                    changed |= persisted.share.permissions != permissions;
                    persisted.share.permissions = permissions;
                }
                if let Some(expiration) = update.expiration {
                    changed |= persisted.share.expiration != expiration;
                    persisted.share.expiration = expiration;
                }
                if let Some(hash) = password_hash {
                    persisted.password = hash;
                    persisted.share.password_protected = !persisted.password.is_empty();
                    changed = true;
                }
                if changed {
                    persisted.share.mtime = Utc::now();
                }
                Ok(persisted.share.clone())
            })
            .await?;

        info!(id = %share.id, "Updated public share");
        Ok(share)
    }

    async fn revoke(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<()> {
        let ctx = ctx.clone();
        let reference = reference.clone();
        let id = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                let persisted = doc.resolve(&reference)?;
                if !is_manager(&ctx, &persisted.share) {
                    return Err(AppError::permission_denied(
                        "Only the owner or creator may revoke a public share",
                    ));
                }
                doc.shares.retain(|s| s.share.id != persisted.share.id);
                Ok(persisted.share.id)
            })
            .await?;

        info!(%id, "Revoked public share");
        Ok(())
    }

    async fn list(
        &self,
        ctx: &UserContext,
        filters: &[ShareFilter],
        sign: bool,
    ) -> AppResult<Vec<PublicShare>> {
        let ctx = ctx.clone();
        let filters = filters.to_vec();
        let matching = self
            .store
            .with(move |doc| {
                doc.purge_expired();
                Ok(doc
                    .shares
                    .iter()
                    .filter(|s| is_manager(&ctx, &s.share))
                    .filter(|s| matches_public_filters(&s.share, &filters))
                    .cloned()
                    .collect::<Vec<_>>())
            })
            .await?;

        matching
            .iter()
            .map(|persisted| sign_if_requested(persisted, sign))
            .collect()
    }
}
