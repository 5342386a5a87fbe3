//! Public link share manager over metadata blobs and the secondary index.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use sharehub_auth::{add_signature, verify_signature, PasswordHasher};
use sharehub_core::config::auth::AuthConfig;
use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::traits::MetadataStorage;
use sharehub_core::types::UserContext;
use sharehub_entity::filter::matches_public_filters;
use sharehub_entity::public::{
    CreatePublicShareRequest, PersistedPublicShare, PublicShare, PublicShareAuthentication,
    PublicShareUpdate,
};
use sharehub_entity::reference::ShareReference;
use sharehub_entity::share::ShareId;
use sharehub_entity::ShareFilter;
use sharehub_indexer::{dedup_preserving_order, IndexSpec, Indexer};

use crate::token::generate_token;
use crate::traits::PublicShareManager;

use super::{add_with_heal, InitGuard};

const SHARES_DIR: &str = "publicshares";
const INDEX_CONTAINER: &str = "publicshares-index";

/// How many token collisions to ride out before giving up. With 15
/// alphanumeric characters a single collision is already improbable.
const TOKEN_ATTEMPTS: usize = 3;

/// Public share manager persisting each link as one blob (keyed by
/// token) plus index entries. The numeric id is allocated by the
/// autoincrement index at creation.
#[derive(Debug)]
pub struct MetadataPublicShareManager {
    storage: Arc<dyn MetadataStorage>,
    indexer: Indexer<PersistedPublicShare>,
    hasher: PasswordHasher,
    token_length: usize,
    init: InitGuard,
}

impl MetadataPublicShareManager {
    /// Create a manager over the given storage backend.
    pub fn new(storage: Arc<dyn MetadataStorage>, auth: &AuthConfig) -> Self {
        let indexer = Indexer::new(Arc::clone(&storage), INDEX_CONTAINER);
        Self {
            storage,
            indexer,
            hasher: PasswordHasher::new(auth.bcrypt_cost),
            token_length: auth.token_length,
            init: InitGuard::default(),
        }
    }

    async fn ensure_init(&self) -> AppResult<()> {
        self.init
            .ensure(|| async {
                self.storage.init().await?;
                self.storage.make_dir_if_not_exist(SHARES_DIR).await?;

                self.indexer
                    .add_index(IndexSpec::autoincrement(
                        "id",
                        1,
                        |s: &PersistedPublicShare| Some(s.share.id.as_str().to_string()),
                    ))
                    .await?;
                self.indexer
                    .add_index(IndexSpec::non_unique("owner", |s: &PersistedPublicShare| {
                        Some(s.share.owner.index_value())
                    }))
                    .await?;
                self.indexer
                    .add_index(IndexSpec::non_unique(
                        "creator",
                        |s: &PersistedPublicShare| Some(s.share.creator.index_value()),
                    ))
                    .await?;
                self.indexer
                    .add_index(IndexSpec::non_unique(
                        "resource",
                        |s: &PersistedPublicShare| Some(s.share.resource_id.index_value()),
                    ))
                    .await?;
                Ok(())
            })
            .await
    }

    fn share_path(token: &str) -> String {
        format!("{SHARES_DIR}/{token}")
    }

    async fn load(&self, token: &str) -> AppResult<PersistedPublicShare> {
        let data = self.storage.simple_download(&Self::share_path(token)).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    async fn store(&self, persisted: &PersistedPublicShare) -> AppResult<()> {
        let data = serde_json::to_vec(persisted)?;
        self.storage
            .simple_upload(&Self::share_path(&persisted.share.token), Bytes::from(data))
            .await
    }

    /// Resolve a reference to a persisted share without authorization.
    async fn resolve(&self, reference: &ShareReference) -> AppResult<PersistedPublicShare> {
        match reference {
            ShareReference::Token(token) => self.load(token).await,
            ShareReference::Id(id) => {
                let pks = self.indexer.find_by("id", id.as_str()).await?;
                match pks.first() {
                    Some(token) => self.load(token).await,
                    None => Err(AppError::not_found("Public share not found")),
                }
            }
            ShareReference::Key(_) => Err(AppError::invalid_argument(
                "Public shares cannot be addressed by composite key",
            )),
        }
    }

    fn is_manager(&self, ctx: &UserContext, share: &PublicShare) -> bool {
        share.owner == ctx.id || share.creator == ctx.id
    }

    async fn reject_expired(
        &self,
        persisted: PersistedPublicShare,
    ) -> AppResult<PersistedPublicShare> {
        if persisted.share.is_expired(Utc::now()) {
            self.revoke_expired(&persisted).await;
            return Err(AppError::not_found("Public share not found"));
        }
        Ok(persisted)
    }

    async fn revoke_expired(&self, persisted: &PersistedPublicShare) {
        debug!(token = %persisted.share.token, "Revoking expired public share");
        if let Err(e) = self.remove_record(persisted).await {
            warn!(
                token = %persisted.share.token,
                error = %e,
                "Failed to revoke expired public share"
            );
        }
    }

    async fn remove_record(&self, persisted: &PersistedPublicShare) -> AppResult<()> {
        match self
            .storage
            .delete(&Self::share_path(&persisted.share.token))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.indexer.remove(persisted).await
    }

    /// Attach a fresh signature if requested and the share is protected.
    fn sign_if_requested(
        &self,
        persisted: &PersistedPublicShare,
        sign: bool,
    ) -> AppResult<PublicShare> {
        let mut share = persisted.share.clone();
        if sign && share.password_protected {
            add_signature(&mut share, &persisted.password)?;
        }
        Ok(share)
    }

    async fn free_token(&self) -> AppResult<String> {
        for _ in 0..TOKEN_ATTEMPTS {
            let token = generate_token(self.token_length);
            match self.storage.simple_download(&Self::share_path(&token)).await {
                Ok(_) => continue,
                Err(e) if e.is_not_found() => return Ok(token),
                Err(e) => return Err(e),
            }
        }
        Err(AppError::internal("Failed to generate a free link token"))
    }
}

#[async_trait]
impl PublicShareManager for MetadataPublicShareManager {
    async fn create(
        &self,
        ctx: &UserContext,
        request: CreatePublicShareRequest,
    ) -> AppResult<PublicShare> {
        self.ensure_init().await?;

        let password_hash = match &request.password {
            Some(password) => Some(self.hasher.hash(password).await?),
            None => None,
        };
        let token = self.free_token().await?;

        let now = Utc::now();
        let share = PublicShare {
            // Allocated by the autoincrement index below.
            id: ShareId::from_string(""),
            token,
            resource_id: request.resource_id,
            owner: request.owner,
            creator: ctx.id.clone(),
            permissions: request.permissions,
            ctime: now,
            mtime: now,
            display_name: request.display_name,
            password_protected: false,
            expiration: request.expiration,
            signature: None,
        };
        let mut persisted = PersistedPublicShare::new(share, password_hash);

        self.store(&persisted).await?;
        let results = add_with_heal(&self.indexer, &persisted).await?;

        let id = results
            .iter()
            .find(|r| r.field == "id")
            .map(|r| r.value.clone())
            .ok_or_else(|| AppError::internal("Autoincrement index allocated no id"))?;
        persisted.share.id = ShareId::from_string(id);
        self.store(&persisted).await?;

        info!(
            id = %persisted.share.id,
            token = %persisted.share.token,
            resource = %persisted.share.resource_id,
            "Created public share"
        );
        Ok(persisted.share)
    }

    async fn get(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        sign: bool,
    ) -> AppResult<PublicShare> {
        self.ensure_init().await?;

        let persisted = self.resolve(reference).await?;
        if !self.is_manager(ctx, &persisted.share) {
            return Err(AppError::not_found("Public share not found"));
        }
        let persisted = self.reject_expired(persisted).await?;
        self.sign_if_requested(&persisted, sign)
    }

    async fn get_by_token(
        &self,
        token: &str,
        authentication: Option<&PublicShareAuthentication>,
        sign: bool,
    ) -> AppResult<PublicShare> {
        self.ensure_init().await?;

        let persisted = self.load(token).await?;
        let persisted = self.reject_expired(persisted).await?;

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

        self.sign_if_requested(&persisted, sign)
    }

    async fn update(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        update: PublicShareUpdate,
    ) -> AppResult<PublicShare> {
        self.ensure_init().await?;

        let persisted = self.resolve(reference).await?;
        if !self.is_manager(ctx, &persisted.share) {
            return Err(AppError::permission_denied(
                "Only the owner or creator may modify a public share",
            ));
        }
        let mut persisted = self.reject_expired(persisted).await?;

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
        if let Some(password) = update.password {
            persisted.password = match password {
                Some(plaintext) => self.hasher.hash(&plaintext).await?,
                None => String::new(),
            };
            persisted.share.password_protected = !persisted.password.is_empty();
            changed = true;
        }

        if changed {
            persisted.share.mtime = Utc::now();
            self.store(&persisted).await?;
            info!(id = %persisted.share.id, "Updated public share");
        }
        Ok(persisted.share)
    }

    async fn revoke(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<()> {
        self.ensure_init().await?;

        let persisted = self.resolve(reference).await?;
        if !self.is_manager(ctx, &persisted.share) {
            return Err(AppError::permission_denied(
                "Only the owner or creator may revoke a public share",
            ));
        }
        self.remove_record(&persisted).await?;
        info!(id = %persisted.share.id, "Revoked public share");
        Ok(())
    }

    async fn list(
        &self,
        ctx: &UserContext,
        filters: &[ShareFilter],
        sign: bool,
    ) -> AppResult<Vec<PublicShare>> {
        self.ensure_init().await?;

        let caller = ctx.id.index_value();
        let mut tokens = self.indexer.find_by("owner", &caller).await?;
        tokens.extend(self.indexer.find_by("creator", &caller).await?);

        let mut shares = Vec::new();
        for token in dedup_preserving_order(tokens) {
            let persisted = match self.load(&token).await {
                Ok(persisted) => persisted,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            if persisted.share.is_expired(Utc::now()) {
                self.revoke_expired(&persisted).await;
                continue;
            }
            if !matches_public_filters(&persisted.share, filters) {
                continue;
            }
            shares.push(self.sign_if_requested(&persisted, sign)?);
        }
        Ok(shares)
    }
}
