//! Cross-backend behavioral parity.
//!
//! Every share manager backend must expose the same observable
//! semantics; these tests run the same scenarios against all of them
//! and fail with the backend name when one diverges.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use sharehub_core::config::auth::AuthConfig;
use sharehub_core::error::ErrorKind;
use sharehub_core::traits::MetadataStorage;
use sharehub_core::types::{
    Grantee, GranteeType, GroupId, Permissions, ResourceId, UserContext, UserId,
};
use sharehub_entity::public::{CreatePublicShareRequest, PublicShareAuthentication};
use sharehub_entity::reference::{ShareKey, ShareReference};
use sharehub_entity::share::{
    CreateShareRequest, ReceivedShareField, ShareState, ShareUpdate,
};
use sharehub_entity::ShareFilter;
use sharehub_manager::json::{JsonPublicShareManager, JsonShareManager, JsonStore};
use sharehub_manager::metadata::{MetadataPublicShareManager, MetadataShareManager};
use sharehub_manager::sql::{self, SqlShareManager};
use sharehub_manager::traits::DenyAllStatter;
use sharehub_manager::{PublicShareManager, ShareManager};
use sharehub_storage::LocalMetadataStorage;

fn alice() -> UserContext {
    UserContext::new(UserId::new("idp", "alice"))
}

fn bob() -> UserContext {
    UserContext::new(UserId::new("idp", "bob"))
}

fn request(resource: &str, grantee: Grantee) -> CreateShareRequest {
    CreateShareRequest {
        resource_id: ResourceId::new("s1", resource),
        owner: UserId::new("idp", "alice"),
        grantee,
        permissions: Permissions::viewer(),
        description: None,
        expiration: None,
    }
}

fn to_bob(resource: &str) -> CreateShareRequest {
    request(resource, Grantee::User(UserId::new("idp", "bob")))
}

async fn share_backends() -> Vec<(&'static str, TempDir, Arc<dyn ShareManager>)> {
    let mut backends: Vec<(&'static str, TempDir, Arc<dyn ShareManager>)> = Vec::new();

    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn MetadataStorage> =
        Arc::new(LocalMetadataStorage::new(dir.path().to_str().unwrap()));
    backends.push((
        "metadata",
        dir,
        Arc::new(MetadataShareManager::new(storage, Arc::new(DenyAllStatter))),
    ));

    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::new(dir.path().join("shares.json"));
    backends.push(("json", dir, Arc::new(JsonShareManager::new(store))));

    let dir = tempfile::tempdir().unwrap();
    let pool = sql::connect("sqlite::memory:").await.unwrap();
    backends.push(("sql", dir, Arc::new(SqlShareManager::new(pool))));

    backends
}

fn test_auth() -> AuthConfig {
    AuthConfig {
        bcrypt_cost: 4,
        token_length: 15,
    }
}

async fn public_backends() -> Vec<(&'static str, TempDir, Arc<dyn PublicShareManager>)> {
    let mut backends: Vec<(&'static str, TempDir, Arc<dyn PublicShareManager>)> = Vec::new();

    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn MetadataStorage> =
        Arc::new(LocalMetadataStorage::new(dir.path().to_str().unwrap()));
    backends.push((
        "metadata",
        dir,
        Arc::new(MetadataPublicShareManager::new(storage, &test_auth())),
    ));

    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::new(dir.path().join("public.json"));
    backends.push((
        "json",
        dir,
        Arc::new(JsonPublicShareManager::new(store, &test_auth())),
    ));

    backends
}

#[tokio::test]
async fn test_share_lifecycle() {
    for (name, _dir, manager) in share_backends().await {
        let created = manager.create(&alice(), to_bob("r1")).await.unwrap();

        let by_id = manager
            .get(&alice(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(by_id.id, created.id, "{name}: get by id");

        let by_key = manager
            .get(
                &alice(),
                &ShareReference::Key(Box::new(ShareKey {
                    owner: UserId::new("idp", "alice"),
                    resource_id: ResourceId::new("s1", "r1"),
                    grantee: Grantee::User(UserId::new("idp", "bob")),
                })),
            )
            .await
            .unwrap();
        assert_eq!(by_key.id, created.id, "{name}: get by key");

        let err = manager.create(&alice(), to_bob("r1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyExists, "{name}: duplicate");

        let updated = manager
            .update(
                &alice(),
                &ShareReference::Id(created.id.clone()),
                ShareUpdate {
                    permissions: Some(Permissions::editor()),
                    description: Some("for review".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.permissions, Permissions::editor(), "{name}: update");
        assert_eq!(updated.description.as_deref(), Some("for review"));
        assert!(updated.mtime >= created.mtime, "{name}: mtime refreshed");

        manager
            .unshare(&alice(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap();
        let err = manager
            .get(&alice(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound, "{name}: gone after unshare");

        // The slot is free again.
        manager.create(&alice(), to_bob("r1")).await.unwrap();
    }
}

#[tokio::test]
async fn test_share_disclosure_rules() {
    for (name, _dir, manager) in share_backends().await {
        let created = manager.create(&alice(), to_bob("r1")).await.unwrap();
        let carol = UserContext::new(UserId::new("idp", "carol"));

        // A stranger cannot tell "hidden" from "absent".
        let err = manager
            .get(&carol, &ShareReference::Id(created.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound, "{name}: stranger read");

        // The grantee can read but not mutate.
        manager
            .get(&bob(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap();
        let err = manager
            .update(
                &bob(),
                &ShareReference::Id(created.id.clone()),
                ShareUpdate {
                    permissions: Some(Permissions::editor()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::PermissionDenied,
            "{name}: grantee update"
        );
        let err = manager
            .unshare(&bob(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::PermissionDenied,
            "{name}: grantee unshare"
        );
    }
}

#[tokio::test]
async fn test_received_flow() {
    for (name, _dir, manager) in share_backends().await {
        let direct = manager.create(&alice(), to_bob("r1")).await.unwrap();
        manager
            .create(&alice(), request("r2", Grantee::Group(GroupId::new("crew"))))
            .await
            .unwrap();

        let bob_in_crew = UserContext::with_groups(
            UserId::new("idp", "bob"),
            vec![GroupId::new("crew")],
        );
        let received = manager.list_received(&bob_in_crew, &[]).await.unwrap();
        assert_eq!(received.len(), 2, "{name}: direct + group grant");
        assert!(
            received.iter().all(|r| r.state == ShareState::Pending),
            "{name}: starts pending"
        );

        // Accept the direct share with a mount point.
        let mut accepted = manager
            .get_received(&bob(), &ShareReference::Id(direct.id.clone()))
            .await
            .unwrap();
        accepted.state = ShareState::Accepted;
        accepted.mount_point = Some("/home/bob/r1".to_string());
        let stored = manager
            .update_received(
                &bob(),
                accepted,
                &[ReceivedShareField::State, ReceivedShareField::MountPoint],
            )
            .await
            .unwrap();
        assert_eq!(stored.state, ShareState::Accepted, "{name}: accepted");
        assert_eq!(stored.mount_point.as_deref(), Some("/home/bob/r1"));

        // Rereading reflects the persisted state.
        let reread = manager
            .get_received(&bob(), &ShareReference::Id(direct.id.clone()))
            .await
            .unwrap();
        assert_eq!(reread.state, ShareState::Accepted, "{name}: state sticks");

        // The owner has no received view of their own share.
        let err = manager
            .get_received(&alice(), &ShareReference::Id(direct.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound, "{name}: owner not grantee");
    }
}

#[tokio::test]
async fn test_recipient_state_is_per_user() {
    for (name, _dir, manager) in share_backends().await {
        manager
            .create(&alice(), request("r1", Grantee::Group(GroupId::new("crew"))))
            .await
            .unwrap();

        let bob_in_crew = UserContext::with_groups(
            UserId::new("idp", "bob"),
            vec![GroupId::new("crew")],
        );
        let carol_in_crew = UserContext::with_groups(
            UserId::new("idp", "carol"),
            vec![GroupId::new("crew")],
        );

        let mut received = manager
            .list_received(&bob_in_crew, &[])
            .await
            .unwrap()
            .pop()
            .unwrap();
        received.state = ShareState::Rejected;
        manager
            .update_received(&bob_in_crew, received, &[ReceivedShareField::State])
            .await
            .unwrap();

        // Carol's view of the same group share is untouched.
        let carols = manager
            .list_received(&carol_in_crew, &[])
            .await
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(carols.state, ShareState::Pending, "{name}: state isolated");
    }
}

#[tokio::test]
async fn test_list_filters_and_of_ors() {
    for (name, _dir, manager) in share_backends().await {
        manager.create(&alice(), to_bob("a")).await.unwrap();
        manager.create(&alice(), to_bob("b")).await.unwrap();
        manager.create(&alice(), to_bob("c")).await.unwrap();
        manager
            .create(&alice(), request("a", Grantee::Group(GroupId::new("crew"))))
            .await
            .unwrap();

        // (resource=a OR resource=b) AND grantee_type=user
        let filters = vec![
            ShareFilter::ResourceId(ResourceId::new("s1", "a")),
            ShareFilter::ResourceId(ResourceId::new("s1", "b")),
            ShareFilter::GranteeType(GranteeType::User),
        ];
        let listed = manager.list(&alice(), &filters).await.unwrap();
        let mut resources: Vec<&str> = listed
            .iter()
            .map(|s| s.resource_id.opaque_id.as_str())
            .collect();
        resources.sort_unstable();
        assert_eq!(resources, ["a", "b"], "{name}: AND of OR groups");
    }
}

#[tokio::test]
async fn test_expired_share_is_absent() {
    for (name, _dir, manager) in share_backends().await {
        let mut expired = to_bob("r1");
        expired.expiration = Some(Utc::now() - Duration::seconds(1));
        let created = manager.create(&alice(), expired).await.unwrap();

        let err = manager
            .get(&alice(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound, "{name}: expired read");
        assert!(
            manager.list(&alice(), &[]).await.unwrap().is_empty(),
            "{name}: expired listed"
        );

        // The composite slot is free for a replacement.
        manager.create(&alice(), to_bob("r1")).await.unwrap();
    }
}

#[tokio::test]
async fn test_public_share_lifecycle() {
    for (name, _dir, manager) in public_backends().await {
        let created = manager
            .create(
                &alice(),
                CreatePublicShareRequest {
                    resource_id: ResourceId::new("s1", "r1"),
                    owner: UserId::new("idp", "alice"),
                    permissions: Permissions::viewer(),
                    password: Some("hunter2".to_string()),
                    display_name: "quarterly report".to_string(),
                    expiration: None,
                },
            )
            .await
            .unwrap();
        assert!(created.password_protected, "{name}: protected");
        assert_eq!(created.token.len(), 15, "{name}: token length");

        // Anonymous access requires the password.
        let err = manager
            .get_by_token(&created.token, None, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials, "{name}: no auth");
        let err = manager
            .get_by_token(
                &created.token,
                Some(&PublicShareAuthentication::Password("wrong".to_string())),
                false,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::InvalidCredentials,
            "{name}: wrong password"
        );

        // A correct password yields a signature usable for re-auth.
        let signed = manager
            .get_by_token(
                &created.token,
                Some(&PublicShareAuthentication::Password("hunter2".to_string())),
                true,
            )
            .await
            .unwrap();
        let signature = signed.signature.expect("signature requested");
        manager
            .get_by_token(
                &created.token,
                Some(&PublicShareAuthentication::Signature(signature)),
                false,
            )
            .await
            .unwrap();

        // The owner resolves it without link-holder credentials.
        let as_owner = manager
            .get(&alice(), &ShareReference::Id(created.id.clone()), false)
            .await
            .unwrap();
        assert_eq!(as_owner.token, created.token, "{name}: owner get");
        let err = manager
            .get(&bob(), &ShareReference::Id(created.id.clone()), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound, "{name}: stranger get");

        manager
            .revoke(&alice(), &ShareReference::Id(created.id.clone()))
            .await
            .unwrap();
        let err = manager
            .get_by_token(&created.token, None, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound, "{name}: revoked");
    }
}
