//! Integration tests for storage accounting.

mod helpers;

use bytes::Bytes;

use drivecore_entity::ResourceRef;

use helpers::{TestDrive, as_user};

#[tokio::test]
async fn test_usage_tracks_live_files() {
    let drive = TestDrive::new().await;
    let u1 = drive.user("u1@example.com").await;
    let u2 = drive.user("u2@example.com").await;
    let ctx = as_user(u1);

    assert_eq!(drive.services.accounting.usage(u1).await.unwrap().total_size, 0);

    let mut ids = Vec::new();
    for (i, size) in [10usize, 20, 30, 40].into_iter().enumerate() {
        let file = drive
            .services
            .files
            .upload_file(&ctx, None, &format!("f{i}"), "", Bytes::from(vec![1u8; size]))
            .await
            .unwrap();
        ids.push(file.id);
    }
    drive
        .services
        .files
        .upload_file(&as_user(u2), None, "theirs", "", Bytes::from(vec![1u8; 99]))
        .await
        .unwrap();

    let usage = drive.services.accounting.usage(u1).await.unwrap();
    assert_eq!(usage.total_size, 100);
    assert_eq!(usage.file_count, 4);

    drive.services.trash.soft_delete(&ctx, ResourceRef::file(ids[0])).await.unwrap();
    drive.services.trash.soft_delete(&ctx, ResourceRef::file(ids[1])).await.unwrap();
    drive
        .services
        .trash
        .permanently_delete(&ctx, ResourceRef::file(ids[1]))
        .await
        .unwrap();
    drive.services.trash.restore(&ctx, ResourceRef::file(ids[0])).await.unwrap();
    drive
        .services
        .files
        .replace_content(&ctx, ids[3], "", Bytes::from(vec![1u8; 5]))
        .await
        .unwrap();

    // 10 + 30 + 5
    let usage = drive.services.accounting.my_usage(&ctx).await.unwrap();
    assert_eq!((usage.total_size, usage.file_count), (45, 3));

    let first = drive.services.accounting.recompute(u1).await.unwrap();
    let second = drive.services.accounting.recompute(u1).await.unwrap();
    assert_eq!((first.total_size, first.file_count), (45, 3));
    assert_eq!((second.total_size, second.file_count), (45, 3));
    assert_eq!(drive.services.accounting.usage(u2).await.unwrap().total_size, 99);
}
