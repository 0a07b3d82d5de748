//! Integration tests for folder and file tree operations.

mod helpers;

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use drivecore_core::error::ErrorKind;
use drivecore_core::traits::{BlobStore, UrlDisposition};
use drivecore_service::NewFile;

use helpers::{FlakyBlobStore, TestDrive, as_user};

#[tokio::test]
async fn test_create_and_list_children() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let folders = &drive.services.folders;

    let docs = folders.create_folder(&as_user(u1), "Docs", None).await.unwrap();
    assert!(docs.is_root());
    let reports = folders
        .create_folder(&as_user(u1), "Reports", Some(docs.id))
        .await
        .unwrap();
    let file = drive
        .services
        .files
        .upload_file(
            &as_user(u1),
            Some(docs.id),
            "a.pdf",
            "application/pdf",
            Bytes::from(vec![0u8; 500]),
        )
        .await
        .unwrap();

    let root = folders.get_children(&as_user(u1), None).await.unwrap();
    assert_eq!(root.folders.len(), 1);
    assert!(root.files.is_empty());

    let children = folders.get_children(&as_user(u1), Some(docs.id)).await.unwrap();
    assert_eq!(children.folders[0].id, reports.id);
    assert_eq!(children.files[0].id, file.id);
    assert_eq!(children.files[0].size, 500);
}

#[tokio::test]
async fn test_sibling_names_are_case_insensitive() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let folders = &drive.services.folders;

    folders.create_folder(&as_user(u1), "Docs", None).await.unwrap();
    let err = folders
        .create_folder(&as_user(u1), "docs", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateName);

    // A file and a folder may share a name.
    drive
        .services
        .files
        .upload_file(&as_user(u1), None, "DOCS", "text/plain", Bytes::from_static(b"x"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invalid_names_rejected() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;

    for bad in ["", "   ", "a/b", "..", "back\\slash"] {
        let err = drive
            .services
            .folders
            .create_folder(&as_user(u1), bad, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "{bad:?}");
    }
}

#[tokio::test]
async fn test_parent_owned_by_another_user_is_invalid() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;

    let docs = drive
        .services
        .folders
        .create_folder(&as_user(u1), "Docs", None)
        .await
        .unwrap();
    let err = drive
        .services
        .folders
        .create_folder(&as_user(u2), "Mine", Some(docs.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidParent);
}

#[tokio::test]
async fn test_move_into_descendant_is_a_cycle() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let folders = &drive.services.folders;

    let a = folders.create_folder(&as_user(u1), "A", None).await.unwrap();
    let b = folders.create_folder(&as_user(u1), "B", Some(a.id)).await.unwrap();
    let c = folders.create_folder(&as_user(u1), "C", Some(b.id)).await.unwrap();

    for target in [a.id, b.id, c.id] {
        let err = folders
            .move_folder(&as_user(u1), a.id, Some(target))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cycle);
    }

    // Tree unchanged.
    let path: Vec<Uuid> = folders
        .get_path(&as_user(u1), c.id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(path, vec![a.id, b.id, c.id]);
    assert!(folders.get_folder(&as_user(u1), a.id).await.unwrap().is_root());
}

#[tokio::test]
async fn test_moves_always_terminate_at_a_root() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let folders = &drive.services.folders;

    let mut ids = Vec::new();
    for i in 0..6 {
        let f = folders
            .create_folder(&as_user(u1), &format!("f{i}"), None)
            .await
            .unwrap();
        ids.push(f.id);
    }

    // A deterministic shuffle of moves, some of which must be rejected.
    for (i, &id) in ids.iter().enumerate() {
        for (j, &target) in ids.iter().enumerate() {
            if (i * 7 + j * 3) % 4 == 0 {
                let _ = folders.move_folder(&as_user(u1), id, Some(target)).await;
            }
        }
    }

    for &id in &ids {
        let path = folders.get_path(&as_user(u1), id).await.unwrap();
        assert!(path.len() <= ids.len());
        assert!(path[0].is_root());
        assert_eq!(path.last().unwrap().id, id);
    }
}

#[tokio::test]
async fn test_move_file_and_rename() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let a = drive.services.folders.create_folder(&ctx, "A", None).await.unwrap();
    let b = drive.services.folders.create_folder(&ctx, "B", None).await.unwrap();
    let file = drive
        .services
        .files
        .upload_file(&ctx, Some(a.id), "n.txt", "text/plain", Bytes::from_static(b"1"))
        .await
        .unwrap();
    drive
        .services
        .files
        .upload_file(&ctx, Some(b.id), "N.TXT", "text/plain", Bytes::from_static(b"2"))
        .await
        .unwrap();

    let err = drive
        .services
        .files
        .move_file(&ctx, file.id, Some(b.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateName);

    let renamed = drive
        .services
        .files
        .rename_file(&ctx, file.id, "m.txt")
        .await
        .unwrap();
    assert_eq!(renamed.name, "m.txt");

    let moved = drive
        .services
        .files
        .move_file(&ctx, file.id, Some(b.id))
        .await
        .unwrap();
    assert_eq!(moved.folder_id, Some(b.id));

    let root = drive.services.files.move_file(&ctx, file.id, None).await.unwrap();
    assert_eq!(root.folder_id, None);
}

#[tokio::test]
async fn test_replace_content_keeps_identity() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let file = drive
        .services
        .files
        .upload_file(&ctx, None, "notes.txt", "text/plain", Bytes::from_static(b"first"))
        .await
        .unwrap();
    assert_eq!(file.version, 1);

    let updated = drive
        .services
        .files
        .replace_content(&ctx, file.id, "text/plain", Bytes::from_static(b"second draft"))
        .await
        .unwrap();
    assert_eq!(updated.id, file.id);
    assert_ne!(updated.storage_path, file.storage_path);
    assert_eq!(updated.version, 2);
    assert_eq!(updated.size, 12);
    assert!(drive.blobs.get(&file.storage_path).await.is_err());

    let content = drive.services.files.read_content(&ctx, file.id).await.unwrap();
    assert_eq!(content.data, Bytes::from_static(b"second draft"));

    let usage = drive.services.accounting.usage(u1).await.unwrap();
    assert_eq!(usage.total_size, 12);
}

#[tokio::test]
async fn test_replace_content_rejected_keeps_old_content() {
    let blobs = Arc::new(FlakyBlobStore::new());
    let drive = TestDrive::with_blobs(blobs.clone());
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    let file = drive
        .services
        .files
        .upload_file(&ctx, None, "notes.txt", "text/plain", Bytes::from_static(b"first"))
        .await
        .unwrap();

    // The file is trashed while the new bytes are being written.
    blobs.trash_on_next_put(Arc::clone(&drive.store), u1, file.id);
    let err = drive
        .services
        .files
        .replace_content(&ctx, file.id, "text/plain", Bytes::from_static(b"second draft"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let stored = drive.store.find_file(file.id).await.unwrap().unwrap();
    assert_eq!(stored.storage_path, file.storage_path);
    assert_eq!(stored.size, 5);
    assert_eq!(stored.version, 1);
    assert_eq!(
        blobs.get(&stored.storage_path).await.unwrap(),
        Bytes::from_static(b"first")
    );
    assert_eq!(blobs.blob_count(), 1);
}

#[tokio::test]
async fn test_create_file_records_existing_blob() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;

    let path = drive
        .blobs
        .put(Bytes::from_static(b"abc"), &format!("{u1}/external"))
        .await
        .unwrap();
    let file = drive
        .services
        .files
        .create_file(
            &as_user(u1),
            NewFile {
                folder_id: None,
                name: "external.bin".to_string(),
                size: 3,
                mime_type: String::new(),
                storage_path: path.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(file.mime_type, "application/octet-stream");
    assert_eq!(file.storage_path, path);

    let url = drive
        .services
        .files
        .download_url(&as_user(u1), file.id, UrlDisposition::Inline, None)
        .await
        .unwrap();
    assert!(url.starts_with(&format!("http://blobs.test/{path}?disposition=inline")));
}

#[tokio::test]
async fn test_rejected_upload_leaves_no_blob() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let ctx = as_user(u1);

    drive
        .services
        .files
        .upload_file(&ctx, None, "dup.txt", "text/plain", Bytes::from_static(b"1"))
        .await
        .unwrap();
    let err = drive
        .services
        .files
        .upload_file(&ctx, None, "DUP.txt", "text/plain", Bytes::from_static(b"2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateName);

    let usage = drive.services.accounting.recompute(u1).await.unwrap();
    assert_eq!(usage.file_count, 1);
    assert_eq!(usage.total_size, 1);
}
