//! Integration tests for soft delete, restore, and permanent purge.

mod helpers;

use std::sync::Arc;

use bytes::Bytes;

use drivecore_core::error::ErrorKind;
use drivecore_core::types::PageRequest;
use drivecore_entity::{Resource, ResourceRef};
use drivecore_service::DeleteOutcome;

use helpers::{FlakyBlobStore, TestDrive, as_user, test_config};

#[tokio::test]
async fn test_docs_scenario() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let pdf = drive
        .services
        .files
        .upload_file(
            &ctx,
            Some(docs.id),
            "a.pdf",
            "application/pdf",
            Bytes::from(vec![7u8; 500]),
        )
        .await
        .unwrap();
    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().total_size, 500);

    let outcome = drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Trashed { records: 2 });

    let docs_now = drive.services.folders.get_folder(&ctx, docs.id).await.unwrap();
    let pdf_now = drive.store.find_file(pdf.id).await.unwrap().unwrap();
    assert!(docs_now.is_deleted);
    assert!(pdf_now.is_deleted);
    assert_eq!(docs_now.deleted_at, pdf_now.deleted_at);

    let trash = drive
        .services
        .trash
        .list_trash(&ctx, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(trash.folders.total, 1);
    assert_eq!(trash.files.total, 1);
    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().total_size, 0);

    drive
        .services
        .trash
        .restore(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();
    drive
        .services
        .trash
        .restore(&ctx, ResourceRef::file(pdf.id))
        .await
        .unwrap();

    assert!(!drive.services.folders.get_folder(&ctx, docs.id).await.unwrap().is_deleted);
    assert!(!drive.services.files.get_file(&ctx, pdf.id).await.unwrap().is_deleted);
    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().total_size, 500);
}

#[tokio::test]
async fn test_soft_delete_marks_every_descendant() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);
    let folders = &drive.services.folders;

    let top = folders.create_folder(&ctx, "top", None).await.unwrap();
    let mid = folders.create_folder(&ctx, "mid", Some(top.id)).await.unwrap();
    let leaf = folders.create_folder(&ctx, "leaf", Some(mid.id)).await.unwrap();
    let side = folders.create_folder(&ctx, "side", Some(top.id)).await.unwrap();
    for (i, parent) in [top.id, mid.id, leaf.id].into_iter().enumerate() {
        drive
            .services
            .files
            .upload_file(&ctx, Some(parent), &format!("f{i}"), "", Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    // Four folders and three files.
    let outcome = drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::folder(top.id))
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Trashed { records: 7 });

    let subtree = drive.store.collect_subtree(u1, top.id, 100).await.unwrap();
    let stamp = subtree.folders[0].deleted_at;
    assert!(stamp.is_some());
    assert!(subtree.folders.iter().all(|f| f.is_deleted && f.deleted_at == stamp));
    assert!(subtree.files.iter().all(|f| f.is_deleted && f.deleted_at == stamp));
    assert!(subtree.folders.iter().any(|f| f.id == side.id));
}

#[tokio::test]
async fn test_restore_into_trashed_parent_is_orphaned() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let file = drive
        .services
        .files
        .upload_file(&ctx, Some(docs.id), "a.txt", "text/plain", Bytes::from_static(b"abc"))
        .await
        .unwrap();
    drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();

    let before = drive.store.find_file(file.id).await.unwrap().unwrap();
    let err = drive
        .services
        .trash
        .restore(&ctx, ResourceRef::file(file.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::OrphanedParent);

    let after = drive.store.find_file(file.id).await.unwrap().unwrap();
    assert_eq!(before, after);
    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().total_size, 0);
}

#[tokio::test]
async fn test_restore_live_resource_is_not_in_trash() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let err = drive
        .services
        .trash
        .restore(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotInTrash);
}

#[tokio::test]
async fn test_cascade_restore_when_enabled() {
    let mut config = test_config();
    config.trash.cascade_restore = true;
    let drive = TestDrive::with_config(config).await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let inner = drive
        .services
        .folders
        .create_folder(&ctx, "inner", Some(docs.id))
        .await
        .unwrap();
    let early = drive
        .services
        .files
        .upload_file(&ctx, Some(inner.id), "early.txt", "", Bytes::from_static(b"12"))
        .await
        .unwrap();
    let late = drive
        .services
        .files
        .upload_file(&ctx, Some(inner.id), "late.txt", "", Bytes::from_static(b"345"))
        .await
        .unwrap();

    // Trashed separately, so it must stay in the trash.
    drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::file(early.id))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();

    let restored = drive
        .services
        .trash
        .restore(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();
    assert!(matches!(restored, Resource::Folder(ref f) if !f.is_deleted));

    assert!(!drive.store.find_folder(inner.id).await.unwrap().unwrap().is_deleted);
    assert!(!drive.store.find_file(late.id).await.unwrap().unwrap().is_deleted);
    assert!(drive.store.find_file(early.id).await.unwrap().unwrap().is_deleted);
    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().total_size, 3);
}

#[tokio::test]
async fn test_single_node_restore_by_default() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let inner = drive
        .services
        .folders
        .create_folder(&ctx, "inner", Some(docs.id))
        .await
        .unwrap();
    drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();
    drive
        .services
        .trash
        .restore(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();

    assert!(drive.store.find_folder(inner.id).await.unwrap().unwrap().is_deleted);
}

#[tokio::test]
async fn test_trashed_resources_hidden_from_non_owner_operations() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let file = drive
        .services
        .files
        .upload_file(&ctx, None, "a.txt", "", Bytes::from_static(b"abc"))
        .await
        .unwrap();
    drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::file(file.id))
        .await
        .unwrap();

    // The owner can still see metadata but not content.
    assert!(drive.services.files.get_file(&ctx, file.id).await.unwrap().is_deleted);
    let err = drive.services.files.read_content(&ctx, file.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    let err = drive
        .services
        .files
        .rename_file(&ctx, file.id, "b.txt")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_permanent_delete_removes_rows_and_blobs() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let sub = drive
        .services
        .folders
        .create_folder(&ctx, "sub", Some(docs.id))
        .await
        .unwrap();
    let file = drive
        .services
        .files
        .upload_file(&ctx, Some(sub.id), "a.txt", "", Bytes::from_static(b"abc"))
        .await
        .unwrap();

    let report = drive
        .services
        .trash
        .permanently_delete(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(report.folders, 2);

    assert!(drive.store.find_folder(docs.id).await.unwrap().is_none());
    assert!(drive.store.find_folder(sub.id).await.unwrap().is_none());
    assert!(drive.store.find_file(file.id).await.unwrap().is_none());
    assert!(drive.blobs.get(&file.storage_path).await.is_err());
    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().file_count, 0);
}

#[tokio::test]
async fn test_failed_blob_delete_keeps_row_in_trash() {
    let blobs = Arc::new(FlakyBlobStore::new());
    let drive = TestDrive::with_blobs(blobs.clone());
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let file = drive
        .services
        .files
        .upload_file(&ctx, None, "a.txt", "", Bytes::from_static(b"abc"))
        .await
        .unwrap();
    drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::file(file.id))
        .await
        .unwrap();

    blobs.fail_deletes(true);
    let err = drive
        .services
        .trash
        .permanently_delete(&ctx, ResourceRef::file(file.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BlobStore);
    assert!(err.is_retryable());
    assert_eq!(blobs.delete_calls(), 3);

    let still = drive.store.find_file(file.id).await.unwrap().unwrap();
    assert!(still.is_deleted);
    assert!(blobs.contains(&file.storage_path));

    blobs.fail_deletes(false);
    drive
        .services
        .trash
        .permanently_delete(&ctx, ResourceRef::file(file.id))
        .await
        .unwrap();
    assert!(drive.store.find_file(file.id).await.unwrap().is_none());
    assert!(!blobs.contains(&file.storage_path));
}

#[tokio::test]
async fn test_empty_trash() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let keep = drive
        .services
        .files
        .upload_file(&ctx, None, "keep.txt", "", Bytes::from_static(b"keep"))
        .await
        .unwrap();
    drive
        .services
        .files
        .upload_file(&ctx, Some(docs.id), "in.txt", "", Bytes::from_static(b"in"))
        .await
        .unwrap();
    let loose = drive
        .services
        .files
        .upload_file(&ctx, None, "loose.txt", "", Bytes::from_static(b"loose"))
        .await
        .unwrap();

    for target in [ResourceRef::folder(docs.id), ResourceRef::file(loose.id)] {
        drive.services.trash.soft_delete(&ctx, target).await.unwrap();
    }

    let report = drive.services.trash.empty_trash(&ctx).await.unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.folders, 1);

    let trash = drive
        .services
        .trash
        .list_trash(&ctx, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(trash.files.total + trash.folders.total, 0);
    assert!(drive.store.find_file(keep.id).await.unwrap().is_some());
    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().total_size, 4);
}

#[tokio::test]
async fn test_legacy_store_falls_back_to_purge() {
    let drive = TestDrive::legacy().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let docs = drive.services.folders.create_folder(&ctx, "Docs", None).await.unwrap();
    let file = drive
        .services
        .files
        .upload_file(&ctx, Some(docs.id), "a.txt", "", Bytes::from_static(b"abc"))
        .await
        .unwrap();

    let outcome = drive
        .services
        .trash
        .soft_delete(&ctx, ResourceRef::folder(docs.id))
        .await
        .unwrap();
    match outcome {
        DeleteOutcome::Purged(report) => {
            assert_eq!(report.files, 1);
            assert_eq!(report.folders, 1);
        }
        other => panic!("expected a purge, got {other:?}"),
    }
    assert!(drive.store.find_file(file.id).await.unwrap().is_none());
    assert!(drive.blobs.get(&file.storage_path).await.is_err());
}
