//! Public link share manager over a SQLite mirror table.
//!
//! The table is populated by an external sync job; this manager serves
//! reads (resolution, listing, link-holder authentication) and rejects
//! mutations with `NotImplemented`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use sharehub_auth::{add_signature, verify_signature, PasswordHasher};
use sharehub_core::config::auth::AuthConfig;
use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::types::{Permissions, ResourceId, UserContext, UserId};
use sharehub_entity::filter::matches_public_filters;
use sharehub_entity::public::{
    CreatePublicShareRequest, PublicShare, PublicShareAuthentication, PublicShareUpdate,
};
use sharehub_entity::reference::ShareReference;
use sharehub_entity::share::ShareId;
use sharehub_entity::ShareFilter;

use crate::metadata::InitGuard;
use crate::traits::PublicShareManager;

use super::map_sqlx;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS public_shares (
    id           TEXT PRIMARY KEY,
    token        TEXT NOT NULL UNIQUE,
    storage_id   TEXT NOT NULL,
    opaque_id    TEXT NOT NULL,
    owner_idp    TEXT NOT NULL,
    owner_id     TEXT NOT NULL,
    creator_idp  TEXT NOT NULL,
    creator_id   TEXT NOT NULL,
    permissions  TEXT NOT NULL,
    ctime        TEXT NOT NULL,
    mtime        TEXT NOT NULL,
    display_name TEXT NOT NULL DEFAULT '',
    password     TEXT NOT NULL DEFAULT '',
    expiration   TEXT
);
"#;

const COLUMNS: &str = "id, token, storage_id, opaque_id, owner_idp, owner_id, creator_idp, \
     creator_id, permissions, ctime, mtime, display_name, password, expiration";

#[derive(Debug, sqlx::FromRow)]
struct PublicShareRow {
    id: String,
    token: String,
    storage_id: String,
    opaque_id: String,
    owner_idp: String,
    owner_id: String,
    creator_idp: String,
    creator_id: String,
    permissions: String,
    ctime: DateTime<Utc>,
    mtime: DateTime<Utc>,
    display_name: String,
    password: String,
    expiration: Option<DateTime<Utc>>,
}

impl PublicShareRow {
    fn into_parts(self) -> AppResult<(PublicShare, String)> {
        let permissions: Permissions = serde_json::from_str(&self.permissions)?;
        let share = PublicShare {
            id: ShareId::from_string(self.id),
            token: self.token,
            resource_id: ResourceId::new(self.storage_id, self.opaque_id),
            owner: UserId::new(self.owner_idp, self.owner_id),
            creator: UserId::new(self.creator_idp, self.creator_id),
            permissions,
            ctime: self.ctime,
            mtime: self.mtime,
            display_name: self.display_name,
            password_protected: !self.password.is_empty(),
            expiration: self.expiration,
            signature: None,
        };
        Ok((share, self.password))
    }
}

/// Read-mostly public share manager over a mirror table.
#[derive(Debug)]
pub struct SqlPublicShareManager {
    pool: SqlitePool,
    hasher: PasswordHasher,
    init: InitGuard,
}

impl SqlPublicShareManager {
    /// Create a manager over the given pool; the schema is created on
    /// first use.
    pub fn new(pool: SqlitePool, auth: &AuthConfig) -> Self {
        Self {
            pool,
            hasher: PasswordHasher::new(auth.bcrypt_cost),
            init: InitGuard::default(),
        }
    }

    async fn ensure_init(&self) -> AppResult<()> {
        self.init
            .ensure(|| async {
                sqlx::raw_sql(SCHEMA)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| map_sqlx("create schema", e))?;
                Ok(())
            })
            .await
    }

    async fn fetch(&self, reference: &ShareReference) -> AppResult<(PublicShare, String)> {
        let row: Option<PublicShareRow> = match reference {
            ShareReference::Id(id) => {
                sqlx::query_as(&format!("SELECT {COLUMNS} FROM public_shares WHERE id = ?"))
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| map_sqlx("fetch public share", e))?
            }
            ShareReference::Token(token) => {
                sqlx::query_as(&format!(
                    "SELECT {COLUMNS} FROM public_shares WHERE token = ?"
                ))
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx("fetch public share", e))?
            }
            ShareReference::Key(_) => {
                return Err(AppError::invalid_argument(
                    "Public shares cannot be addressed by composite key",
                ));
            }
        };

        let (share, password) = row
            .ok_or_else(|| AppError::not_found("Public share not found"))?
            .into_parts()?;
        // Mirror rows are not ours to delete; expired just reads absent.
        if share.is_expired(Utc::now()) {
            return Err(AppError::not_found("Public share not found"));
        }
        Ok((share, password))
    }

    fn is_manager(ctx: &UserContext, share: &PublicShare) -> bool {
        share.owner == ctx.id || share.creator == ctx.id
    }

    fn sign_if_requested(
        share: &mut PublicShare,
        password: &str,
        sign: bool,
    ) -> AppResult<()> {
        if sign && share.password_protected {
            add_signature(share, password)?;
        }
        Ok(())
    }
}

#[async_trait]
impl PublicShareManager for SqlPublicShareManager {
    async fn create(
        &self,
        _ctx: &UserContext,
        _request: CreatePublicShareRequest,
    ) -> AppResult<PublicShare> {
        Err(AppError::not_implemented(
            "The SQL public share backend is a read-only mirror",
        ))
    }

    async fn get(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        sign: bool,
    ) -> AppResult<PublicShare> {
        self.ensure_init().await?;

        let (mut share, password) = self.fetch(reference).await?;
        if !Self::is_manager(ctx, &share) {
            return Err(AppError::not_found("Public share not found"));
        }
        Self::sign_if_requested(&mut share, &password, sign)?;
        Ok(share)
    }

    async fn get_by_token(
        &self,
        token: &str,
        authentication: Option<&PublicShareAuthentication>,
        sign: bool,
    ) -> AppResult<PublicShare> {
        self.ensure_init().await?;

        let (mut share, password) = self
            .fetch(&ShareReference::Token(token.to_string()))
            .await?;

        if share.password_protected {
            match authentication {
                Some(PublicShareAuthentication::Password(plaintext)) => {
                    self.hasher.verify(plaintext, &password).await?;
                }
                Some(PublicShareAuthentication::Signature(signature)) => {
                    verify_signature(token, &password, signature)?;
                }
                None => {
                    return Err(AppError::invalid_credentials(
                        "Public share requires a password",
                    ));
                }
            }
        }
        Self::sign_if_requested(&mut share, &password, sign)?;
        Ok(share)
    }

    async fn update(
        &self,
        _ctx: &UserContext,
        _reference: &ShareReference,
        _update: PublicShareUpdate,
    ) -> AppResult<PublicShare> {
        Err(AppError::not_implemented(
            "The SQL public share backend is a read-only mirror",
        ))
    }

    async fn revoke(&self, _ctx: &UserContext, _reference: &ShareReference) -> AppResult<()> {
        Err(AppError::not_implemented(
            "The SQL public share backend is a read-only mirror",
        ))
    }

    async fn list(
        &self,
        ctx: &UserContext,
        filters: &[ShareFilter],
        sign: bool,
    ) -> AppResult<Vec<PublicShare>> {
        self.ensure_init().await?;

        let rows: Vec<PublicShareRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM public_shares \
             WHERE (owner_idp = ? AND owner_id = ?) OR (creator_idp = ? AND creator_id = ?)"
        ))
        .bind(&ctx.id.idp)
        .bind(&ctx.id.opaque_id)
        .bind(&ctx.id.idp)
        .bind(&ctx.id.opaque_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("list public shares", e))?;

        let now = Utc::now();
        let mut shares = Vec::with_capacity(rows.len());
        for row in rows {
            let (mut share, password) = row.into_parts()?;
            if share.is_expired(now) || !matches_public_filters(&share, filters) {
                continue;
            }
            Self::sign_if_requested(&mut share, &password, sign)?;
            shares.push(share);
        }
        Ok(shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_core::error::ErrorKind;

    fn alice() -> UserContext {
        UserContext::new(UserId::new("idp", "alice"))
    }

    async fn manager_with_rows() -> SqlPublicShareManager {
        let pool = super::super::connect("sqlite::memory:").await.unwrap();
        let auth = AuthConfig {
            bcrypt_cost: 4,
            token_length: 15,
        };
        let manager = SqlPublicShareManager::new(pool.clone(), &auth);
        manager.ensure_init().await.unwrap();

        // Rows a sync job would have mirrored in.
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        for (id, token, resource, password) in [
            ("1", "tokAAAAAAAAAAA1", "r1", String::new()),
            ("2", "tokAAAAAAAAAAA2", "r2", hash),
        ] {
            sqlx::query(
                "INSERT INTO public_shares (id, token, storage_id, opaque_id, owner_idp, \
                 owner_id, creator_idp, creator_id, permissions, ctime, mtime, display_name, \
                 password, expiration) VALUES (?, ?, 's1', ?, 'idp', 'alice', 'idp', 'alice', \
                 ?, ?, ?, '', ?, NULL)",
            )
            .bind(id)
            .bind(token)
            .bind(resource)
            .bind(serde_json::to_string(&Permissions::viewer()).unwrap())
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(password)
            .execute(&pool)
            .await
            .unwrap();
        }
        manager
    }

    #[tokio::test]
    async fn test_get_and_list_from_mirror() {
        let manager = manager_with_rows().await;

        let share = manager
            .get(
                &alice(),
                &ShareReference::Id(ShareId::from_string("1")),
                false,
            )
            .await
            .unwrap();
        assert_eq!(share.token, "tokAAAAAAAAAAA1");
        assert!(!share.password_protected);

        let all = manager.list(&alice(), &[], false).await.unwrap();
        assert_eq!(all.len(), 2);

        let bob = UserContext::new(UserId::new("idp", "bob"));
        assert!(manager.list(&bob, &[], false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_auth_against_mirrored_hash() {
        let manager = manager_with_rows().await;

        let err = manager
            .get_by_token("tokAAAAAAAAAAA2", None, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);

        let share = manager
            .get_by_token(
                "tokAAAAAAAAAAA2",
                Some(&PublicShareAuthentication::Password("hunter2".to_string())),
                true,
            )
            .await
            .unwrap();
        assert!(share.signature.is_some());
    }

    #[tokio::test]
    async fn test_mutations_not_supported() {
        let manager = manager_with_rows().await;

        let err = manager
            .revoke(&alice(), &ShareReference::Id(ShareId::from_string("1")))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotImplemented);

        let err = manager
            .update(
                &alice(),
                &ShareReference::Id(ShareId::from_string("1")),
                PublicShareUpdate::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotImplemented);
    }
}
