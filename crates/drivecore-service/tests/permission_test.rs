//! Integration tests for grants and effective access.

mod helpers;

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use drivecore_core::error::ErrorKind;
use drivecore_entity::ResourceRef;
use drivecore_entity::permission::AccessLevel;
use drivecore_service::AccessSource;

use helpers::{TestDrive, as_user};

async fn upload(drive: &TestDrive, owner: Uuid, folder: Option<Uuid>, name: &str) -> Uuid {
    drive
        .services
        .files
        .upload_file(&as_user(owner), folder, name, "text/plain", Bytes::from_static(b"data"))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_read_grant_then_expiry() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    let u3 = drive.user("u3@example.com").await;
    let file = upload(&drive, u1, None, "f.txt").await;

    let expires = Utc::now() + chrono::Duration::milliseconds(300);
    drive
        .services
        .shares
        .grant_user_permission(
            &as_user(u1),
            ResourceRef::file(file),
            "U2@Example.com",
            AccessLevel::Read,
            Some(expires),
        )
        .await
        .unwrap();

    let meta = drive.services.files.get_file(&as_user(u2), file).await.unwrap();
    assert_eq!(meta.id, file);

    let err = drive
        .services
        .files
        .rename_file(&as_user(u2), file, "mine.txt")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let expired = drive.services.files.get_file(&as_user(u2), file).await.unwrap_err();
    let never = drive.services.files.get_file(&as_user(u3), file).await.unwrap_err();
    assert_eq!(expired.kind, ErrorKind::NotFound);
    assert_eq!(expired.kind, never.kind);
    assert_eq!(expired.message, never.message);

    let missing = Uuid::new_v4();
    let absent = drive.services.files.get_file(&as_user(u2), missing).await.unwrap_err();
    assert_eq!(absent.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_grants_do_not_cascade() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;

    let docs = drive
        .services
        .folders
        .create_folder(&as_user(u1), "Docs", None)
        .await
        .unwrap();
    let inner = upload(&drive, u1, Some(docs.id), "inner.txt").await;

    drive
        .services
        .shares
        .grant_user_permission(
            &as_user(u1),
            ResourceRef::folder(docs.id),
            "u2@example.com",
            AccessLevel::Write,
            None,
        )
        .await
        .unwrap();

    let children = drive
        .services
        .folders
        .get_children(&as_user(u2), Some(docs.id))
        .await
        .unwrap();
    assert_eq!(children.files.len(), 1);

    let err = drive.services.files.get_file(&as_user(u2), inner).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_effective_access_sources() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    let file = upload(&drive, u1, None, "f.txt").await;
    let target = ResourceRef::file(file);

    let resource = drive.services.engine.load(target).await.unwrap().unwrap();

    let owner = drive
        .services
        .engine
        .effective_access(&as_user(u1), &resource)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.level, AccessLevel::Owner);
    assert_eq!(owner.source, AccessSource::Owner);

    assert!(
        drive
            .services
            .engine
            .effective_access(&as_user(u2), &resource)
            .await
            .unwrap()
            .is_none()
    );

    drive
        .services
        .shares
        .grant_user_permission(&as_user(u1), target, "u2@example.com", AccessLevel::Admin, None)
        .await
        .unwrap();
    let granted = drive
        .services
        .engine
        .effective_access(&as_user(u2), &resource)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(granted.level, AccessLevel::Admin);
    assert_eq!(granted.source, AccessSource::Grant);
}

#[tokio::test]
async fn test_grant_validation() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    drive.user("u3@example.com").await;
    let file = upload(&drive, u1, None, "f.txt").await;
    let target = ResourceRef::file(file);
    let shares = &drive.services.shares;

    let err = shares
        .grant_user_permission(&as_user(u1), target, "u2@example.com", AccessLevel::Owner, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = shares
        .grant_user_permission(&as_user(u1), target, "nobody@example.com", AccessLevel::Read, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UserNotFound);

    let err = shares
        .grant_user_permission(&as_user(u1), target, "u1@example.com", AccessLevel::Read, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let past = Utc::now() - chrono::Duration::minutes(1);
    let err = shares
        .grant_user_permission(&as_user(u1), target, "u2@example.com", AccessLevel::Read, Some(past))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    // A writer cannot manage permissions at all.
    shares
        .grant_user_permission(&as_user(u1), target, "u2@example.com", AccessLevel::Write, None)
        .await
        .unwrap();
    let err = shares
        .grant_user_permission(&as_user(u2), target, "u3@example.com", AccessLevel::Read, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_regrant_replaces_and_revoke_removes() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    let file = upload(&drive, u1, None, "f.txt").await;
    let target = ResourceRef::file(file);
    let shares = &drive.services.shares;

    shares
        .grant_user_permission(&as_user(u1), target, "u2@example.com", AccessLevel::Read, None)
        .await
        .unwrap();
    shares
        .grant_user_permission(&as_user(u1), target, "u2@example.com", AccessLevel::Write, None)
        .await
        .unwrap();

    let grants = shares.list_permissions(&as_user(u1), target).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].level, AccessLevel::Write);

    let shared = shares.shared_with_me(&as_user(u2)).await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].resource.id(), file);

    drive
        .services
        .files
        .rename_file(&as_user(u2), file, "renamed.txt")
        .await
        .unwrap();

    shares
        .revoke_user_permission(&as_user(u1), target, u2)
        .await
        .unwrap();
    // Revoking again is harmless.
    shares
        .revoke_user_permission(&as_user(u1), target, u2)
        .await
        .unwrap();

    let err = drive.services.files.get_file(&as_user(u2), file).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(shares.shared_with_me(&as_user(u2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_grantee_moves_into_owner_tree_only_with_write_on_destination() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    let file = upload(&drive, u1, None, "f.txt").await;
    let dest = drive
        .services
        .folders
        .create_folder(&as_user(u1), "Dest", None)
        .await
        .unwrap();

    drive
        .services
        .shares
        .grant_user_permission(
            &as_user(u1),
            ResourceRef::file(file),
            "u2@example.com",
            AccessLevel::Write,
            None,
        )
        .await
        .unwrap();

    let err = drive
        .services
        .files
        .move_file(&as_user(u2), file, Some(dest.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    drive
        .services
        .shares
        .grant_user_permission(
            &as_user(u1),
            ResourceRef::folder(dest.id),
            "u2@example.com",
            AccessLevel::Write,
            None,
        )
        .await
        .unwrap();
    let moved = drive
        .services
        .files
        .move_file(&as_user(u2), file, Some(dest.id))
        .await
        .unwrap();
    assert_eq!(moved.folder_id, Some(dest.id));
    assert_eq!(moved.owner_id, u1);
}

#[tokio::test]
async fn test_grantee_path_hides_inaccessible_ancestors() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    let folders = &drive.services.folders;

    let secret = folders
        .create_folder(&as_user(u1), "Secret-Acquisition", None)
        .await
        .unwrap();
    let middle = folders
        .create_folder(&as_user(u1), "Middle", Some(secret.id))
        .await
        .unwrap();
    let inner = folders
        .create_folder(&as_user(u1), "Inner", Some(middle.id))
        .await
        .unwrap();
    for target in [middle.id, inner.id] {
        drive
            .services
            .shares
            .grant_user_permission(
                &as_user(u1),
                ResourceRef::folder(target),
                "u2@example.com",
                AccessLevel::Read,
                None,
            )
            .await
            .unwrap();
    }

    let err = folders.get_folder(&as_user(u2), secret.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let names: Vec<String> = folders
        .get_path(&as_user(u2), inner.id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["Middle", "Inner"]);

    let owner_path = folders.get_path(&as_user(u1), inner.id).await.unwrap();
    assert_eq!(owner_path.len(), 3);
    assert_eq!(owner_path[0].id, secret.id);
}

#[tokio::test]
async fn test_wrong_share_password_keeps_grant() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    let file = upload(&drive, u1, None, "f.txt").await;
    let target = ResourceRef::file(file);

    drive
        .services
        .shares
        .grant_user_permission(&as_user(u1), target, "u2@example.com", AccessLevel::Write, None)
        .await
        .unwrap();
    let share = drive
        .services
        .shares
        .create_public_share(&as_user(u1), target, AccessLevel::Read, None, Some("pw"))
        .await
        .unwrap();

    let ctx = as_user(u2).with_share(share.token.clone(), None);
    let resource = drive.services.engine.load(target).await.unwrap().unwrap();
    let access = drive
        .services
        .engine
        .effective_access(&ctx, &resource)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(access.level, AccessLevel::Write);
    assert_eq!(access.source, AccessSource::Grant);

    drive
        .services
        .files
        .replace_content(&ctx, file, "text/plain", Bytes::from_static(b"edited"))
        .await
        .unwrap();

    // Without a grant the bad password is still the caller's only path.
    let u3 = drive.user("u3@example.com").await;
    let ctx = as_user(u3).with_share(share.token.clone(), Some("wrong".into()));
    let err = drive.services.files.get_file(&ctx, file).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
}
