//! Share manager over a SQLite repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use sharehub_core::error::AppError;
use sharehub_core::result::AppResult;
use sharehub_core::types::{Grantee, GroupId, Permissions, ResourceId, UserContext, UserId};
use sharehub_entity::filter::matches_filters;
use sharehub_entity::reference::ShareReference;
use sharehub_entity::share::{
    CreateShareRequest, ReceivedShare, ReceivedShareField, ReceivedShareState, Share, ShareId,
    ShareState, ShareUpdate,
};
use sharehub_entity::ShareFilter;

use crate::metadata::InitGuard;
use crate::traits::ShareManager;

use super::map_sqlx;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS shares (
    id            TEXT PRIMARY KEY,
    storage_id    TEXT NOT NULL,
    opaque_id     TEXT NOT NULL,
    owner_idp     TEXT NOT NULL,
    owner_id      TEXT NOT NULL,
    creator_idp   TEXT NOT NULL,
    creator_id    TEXT NOT NULL,
    grantee_type  TEXT NOT NULL,
    grantee_idp   TEXT NOT NULL DEFAULT '',
    grantee_id    TEXT NOT NULL,
    permissions   TEXT NOT NULL,
    ctime         TEXT NOT NULL,
    mtime         TEXT NOT NULL,
    description   TEXT,
    expiration    TEXT,
    UNIQUE (owner_idp, owner_id, storage_id, opaque_id, grantee_type, grantee_idp, grantee_id)
);

CREATE TABLE IF NOT EXISTS received_states (
    share_id    TEXT NOT NULL,
    user_idp    TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    state       TEXT NOT NULL,
    mount_point TEXT,
    hidden      INTEGER NOT NULL DEFAULT 0,
    alias       TEXT,
    PRIMARY KEY (share_id, user_idp, user_id)
);
"#;

const SHARE_COLUMNS: &str = "id, storage_id, opaque_id, owner_idp, owner_id, creator_idp, \
     creator_id, grantee_type, grantee_idp, grantee_id, permissions, ctime, mtime, \
     description, expiration";

#[derive(Debug, sqlx::FromRow)]
struct ShareRow {
    id: String,
    storage_id: String,
    opaque_id: String,
    owner_idp: String,
    owner_id: String,
    creator_idp: String,
    creator_id: String,
    grantee_type: String,
    grantee_idp: String,
    grantee_id: String,
    permissions: String,
    ctime: DateTime<Utc>,
    mtime: DateTime<Utc>,
    description: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

impl ShareRow {
    fn into_share(self) -> AppResult<Share> {
        let grantee = match self.grantee_type.as_str() {
            "user" => Grantee::User(UserId::new(self.grantee_idp, self.grantee_id)),
            "group" => Grantee::Group(GroupId::new(self.grantee_id)),
            other => {
                return Err(AppError::database(format!(
                    "Unknown grantee type in shares table: {other}"
                )));
            }
        };
        let permissions: Permissions = serde_json::from_str(&self.permissions)?;
        Ok(Share {
            id: ShareId::from_string(self.id),
            resource_id: ResourceId::new(self.storage_id, self.opaque_id),
            owner: UserId::new(self.owner_idp, self.owner_id),
            creator: UserId::new(self.creator_idp, self.creator_id),
            grantee,
            permissions,
            ctime: self.ctime,
            mtime: self.mtime,
            description: self.description,
            expiration: self.expiration,
        })
    }
}

fn grantee_columns(grantee: &Grantee) -> (&'static str, String, String) {
    match grantee {
        Grantee::User(u) => ("user", u.idp.clone(), u.opaque_id.clone()),
        Grantee::Group(g) => ("group", String::new(), g.opaque_id.clone()),
    }
}

fn state_to_str(state: ShareState) -> &'static str {
    match state {
        ShareState::Pending => "pending",
        ShareState::Accepted => "accepted",
        ShareState::Rejected => "rejected",
    }
}

fn state_from_str(s: &str) -> AppResult<ShareState> {
    match s {
        "pending" => Ok(ShareState::Pending),
        "accepted" => Ok(ShareState::Accepted),
        "rejected" => Ok(ShareState::Rejected),
        other => Err(AppError::database(format!(
            "Unknown share state in received_states table: {other}"
        ))),
    }
}

/// Share manager backed by a SQLite database.
#[derive(Debug)]
pub struct SqlShareManager {
    pool: SqlitePool,
    init: InitGuard,
}

impl SqlShareManager {
    /// Create a manager over the given pool; the schema is created on
    /// first use.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
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

    async fn fetch(&self, reference: &ShareReference) -> AppResult<Share> {
        let row: Option<ShareRow> = match reference {
            ShareReference::Id(id) => {
                sqlx::query_as(&format!("SELECT {SHARE_COLUMNS} FROM shares WHERE id = ?"))
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| map_sqlx("fetch share", e))?
            }
            ShareReference::Key(key) => {
                let (gtype, gidp, gid) = grantee_columns(&key.grantee);
                sqlx::query_as(&format!(
                    "SELECT {SHARE_COLUMNS} FROM shares \
                     WHERE owner_idp = ? AND owner_id = ? AND storage_id = ? AND opaque_id = ? \
                       AND grantee_type = ? AND grantee_idp = ? AND grantee_id = ?"
                ))
                .bind(&key.owner.idp)
                .bind(&key.owner.opaque_id)
                .bind(&key.resource_id.storage_id)
                .bind(&key.resource_id.opaque_id)
                .bind(gtype)
                .bind(gidp)
                .bind(gid)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx("fetch share", e))?
            }
            ShareReference::Token(_) => {
                return Err(AppError::invalid_argument(
                    "Shares cannot be addressed by token",
                ));
            }
        };

        row.ok_or_else(|| AppError::not_found("Share not found"))?
            .into_share()
    }

    /// Reject (and lazily delete) an expired share.
    async fn reject_expired(&self, share: Share) -> AppResult<Share> {
        if share.is_expired(Utc::now()) {
            self.revoke_expired(&share).await;
            return Err(AppError::not_found("Share not found"));
        }
        Ok(share)
    }

    async fn revoke_expired(&self, share: &Share) {
        debug!(id = %share.id, "Revoking expired share");
        if let Err(e) = self.delete_rows(&share.id).await {
            warn!(id = %share.id, error = %e, "Failed to revoke expired share");
        }
    }

    async fn delete_rows(&self, id: &ShareId) -> AppResult<()> {
        sqlx::query("DELETE FROM shares WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("delete share", e))?;
        sqlx::query("DELETE FROM received_states WHERE share_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("delete recipient state", e))?;
        Ok(())
    }

    async fn fetch_state(
        &self,
        share_id: &ShareId,
        user: &UserId,
    ) -> AppResult<ReceivedShareState> {
        let row: Option<(String, Option<String>, bool, Option<String>)> = sqlx::query_as(
            "SELECT state, mount_point, hidden, alias FROM received_states \
             WHERE share_id = ? AND user_idp = ? AND user_id = ?",
        )
        .bind(share_id.as_str())
        .bind(&user.idp)
        .bind(&user.opaque_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("fetch recipient state", e))?;

        match row {
            Some((state, mount_point, hidden, alias)) => Ok(ReceivedShareState {
                state: state_from_str(&state)?,
                mount_point,
                hidden,
                alias,
            }),
            None => Ok(ReceivedShareState::default()),
        }
    }

    /// Convert rows to live shares, lazily revoking expired ones.
    async fn live_shares(&self, rows: Vec<ShareRow>) -> AppResult<Vec<Share>> {
        let mut shares = Vec::with_capacity(rows.len());
        for row in rows {
            let share = row.into_share()?;
            if share.is_expired(Utc::now()) {
                self.revoke_expired(&share).await;
                continue;
            }
            shares.push(share);
        }
        Ok(shares)
    }

    fn is_manager(ctx: &UserContext, share: &Share) -> bool {
        share.owner == ctx.id || share.creator == ctx.id
    }

    fn is_party(ctx: &UserContext, share: &Share) -> bool {
        Self::is_manager(ctx, share) || ctx.matches_grantee(&share.grantee)
    }

    async fn insert(&self, share: &Share) -> AppResult<()> {
        let (gtype, gidp, gid) = grantee_columns(&share.grantee);
        sqlx::query(
            "INSERT INTO shares (id, storage_id, opaque_id, owner_idp, owner_id, creator_idp, \
             creator_id, grantee_type, grantee_idp, grantee_id, permissions, ctime, mtime, \
             description, expiration) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(share.id.as_str())
        .bind(&share.resource_id.storage_id)
        .bind(&share.resource_id.opaque_id)
        .bind(&share.owner.idp)
        .bind(&share.owner.opaque_id)
        .bind(&share.creator.idp)
        .bind(&share.creator.opaque_id)
        .bind(gtype)
        .bind(gidp)
        .bind(gid)
        .bind(serde_json::to_string(&share.permissions)?)
        .bind(share.ctime)
        .bind(share.mtime)
        .bind(&share.description)
        .bind(share.expiration)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("insert share", e))?;
        Ok(())
    }
}

#[async_trait]
impl ShareManager for SqlShareManager {
    async fn create(&self, ctx: &UserContext, request: CreateShareRequest) -> AppResult<Share> {
        self.ensure_init().await?;

        if request.grantee.is_user(&request.owner) || request.grantee.is_user(&ctx.id) {
            return Err(AppError::invalid_argument(
                "Cannot share a resource with its owner or creator",
            ));
        }

        // An expired occupant of the composite key gives way.
        let key = ShareReference::Key(Box::new(sharehub_entity::reference::ShareKey {
            owner: request.owner.clone(),
            resource_id: request.resource_id.clone(),
            grantee: request.grantee.clone(),
        }));
        match self.fetch(&key).await {
            Ok(existing) if existing.is_expired(Utc::now()) => {
                self.revoke_expired(&existing).await;
            }
            Ok(_) => {
                return Err(AppError::already_exists(
                    "A share for this resource and grantee already exists",
                ));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
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
        self.insert(&share).await?;

        info!(id = %share.id, resource = %share.resource_id, "Created share");
        Ok(share)
    }

    async fn get(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<Share> {
        self.ensure_init().await?;
        let share = self.fetch(reference).await?;
        if !Self::is_party(ctx, &share) {
            return Err(AppError::not_found("Share not found"));
        }
        self.reject_expired(share).await
    }

    async fn update(
        &self,
        ctx: &UserContext,
        reference: &ShareReference,
        update: ShareUpdate,
    ) -> AppResult<Share> {
        self.ensure_init().await?;

        let share = self.fetch(reference).await?;
        if !Self::is_manager(ctx, &share) {
            return Err(AppError::permission_denied(
                "Only the owner or creator may modify a share",
            ));
        }
        let mut share = self.reject_expired(share).await?;

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
            sqlx::query(
                "UPDATE shares SET permissions = ?, mtime = ?, description = ?, expiration = ? \
                 WHERE id = ?",
            )
            .bind(serde_json::to_string(&share.permissions)?)
            .bind(share.mtime)
            .bind(&share.description)
            .bind(share.expiration)
            .bind(share.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("update share", e))?;
            info!(id = %share.id, "Updated share");
        }
        Ok(share)
    }

    async fn unshare(&self, ctx: &UserContext, reference: &ShareReference) -> AppResult<()> {
        self.ensure_init().await?;

        let share = self.fetch(reference).await?;
        if !Self::is_manager(ctx, &share) {
            return Err(AppError::permission_denied(
                "Only the owner or creator may remove a share",
            ));
        }
        self.delete_rows(&share.id).await?;
        info!(id = %share.id, "Removed share");
        Ok(())
    }

    async fn list(&self, ctx: &UserContext, filters: &[ShareFilter]) -> AppResult<Vec<Share>> {
        self.ensure_init().await?;

        let rows: Vec<ShareRow> = sqlx::query_as(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares \
             WHERE (owner_idp = ? AND owner_id = ?) OR (creator_idp = ? AND creator_id = ?)"
        ))
        .bind(&ctx.id.idp)
        .bind(&ctx.id.opaque_id)
        .bind(&ctx.id.idp)
        .bind(&ctx.id.opaque_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("list shares", e))?;

        let shares = self.live_shares(rows).await?;
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

        let mut rows: Vec<ShareRow> = sqlx::query_as(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares \
             WHERE grantee_type = 'user' AND grantee_idp = ? AND grantee_id = ?"
        ))
        .bind(&ctx.id.idp)
        .bind(&ctx.id.opaque_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("list received shares", e))?;

        for group in &ctx.groups {
            let group_rows: Vec<ShareRow> = sqlx::query_as(&format!(
                "SELECT {SHARE_COLUMNS} FROM shares \
                 WHERE grantee_type = 'group' AND grantee_id = ?"
            ))
            .bind(&group.opaque_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("list received shares", e))?;
            rows.extend(group_rows);
        }

        let shares = self.live_shares(rows).await?;
        let mut received = Vec::with_capacity(shares.len());
        for share in shares {
            if !matches_filters(&share, filters) {
                continue;
            }
            let state = self.fetch_state(&share.id, &ctx.id).await?;
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

        let share = self.fetch(reference).await?;
        if !ctx.matches_grantee(&share.grantee) {
            return Err(AppError::not_found("Share not found"));
        }
        let share = self.reject_expired(share).await?;
        let state = self.fetch_state(&share.id, &ctx.id).await?;
        Ok(ReceivedShare::merge(share, state))
    }

    async fn update_received(
        &self,
        ctx: &UserContext,
        received: ReceivedShare,
        fields: &[ReceivedShareField],
    ) -> AppResult<ReceivedShare> {
        self.ensure_init().await?;

        let share = self
            .fetch(&ShareReference::Id(received.share.id.clone()))
            .await?;
        if !ctx.matches_grantee(&share.grantee) {
            return Err(AppError::not_found("Share not found"));
        }
        let share = self.reject_expired(share).await?;

        let mut state = self.fetch_state(&share.id, &ctx.id).await?;
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

        sqlx::query(
            "INSERT INTO received_states (share_id, user_idp, user_id, state, mount_point, \
             hidden, alias) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (share_id, user_idp, user_id) DO UPDATE SET \
             state = excluded.state, mount_point = excluded.mount_point, \
             hidden = excluded.hidden, alias = excluded.alias",
        )
        .bind(share.id.as_str())
        .bind(&ctx.id.idp)
        .bind(&ctx.id.opaque_id)
        .bind(state_to_str(state.state))
        .bind(&state.mount_point)
        .bind(state.hidden)
        .bind(&state.alias)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("upsert recipient state", e))?;

        debug!(id = %share.id, user = %ctx.id, "Updated recipient state");
        Ok(ReceivedShare::merge(share, state))
    }
}
