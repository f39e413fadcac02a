use coffer::{migration::BackupSnapshot, storage::StorageOptions};
use serde_json::json;

use crate::helpers::setup;

#[tokio::test]
async fn test_backup_restore_is_byte_exact() {
    let ctx = setup().await;
    let u1 = StorageOptions::new().namespace("u1");
    ctx.storage.set("plain", &json!({"a": [1, 2]}), &u1).await.unwrap();
    ctx.storage
        .set("sealed", "secret", &u1.clone().encrypted())
        .await
        .unwrap();

    let migrator = ctx.migrator();
    let backup = migrator.create_backup(Some("u1")).await.unwrap();
    let before = (ctx.raw("u1:plain").await, ctx.raw("u1:sealed").await);

    assert_eq!(migrator.restore_backup(&backup).await.unwrap(), 2);
    assert_eq!(
        (ctx.raw("u1:plain").await, ctx.raw("u1:sealed").await),
        before
    );
}

#[tokio::test]
async fn test_backup_is_namespace_scoped() {
    let ctx = setup().await;
    ctx.put_legacy("u1:a", &json!(1)).await;
    ctx.put_legacy("u10:a", &json!(2)).await;
    ctx.put_legacy("u2:a", &json!(3)).await;

    let backup = ctx.migrator().create_backup(Some("u1")).await.unwrap();
    assert_eq!(backup.records.keys().collect::<Vec<_>>(), vec!["u1:a"]);
    assert_eq!(backup.created_at, "2024-01-01T00:00:00+00:00");
}

#[tokio::test]
async fn test_restore_undoes_later_writes() {
    let ctx = setup().await;
    let options = StorageOptions::new().namespace("u1");
    ctx.storage.set("k", "before", &options).await.unwrap();

    let migrator = ctx.migrator();
    let backup = migrator.create_backup(Some("u1")).await.unwrap();

    ctx.storage.set("k", "after", &options).await.unwrap();
    ctx.storage.set("new", "kept", &options).await.unwrap();
    migrator.restore_backup(&backup).await.unwrap();

    let k: Option<String> = ctx.storage.get("k", &options).await.unwrap();
    assert_eq!(k.as_deref(), Some("before"));
    let new: Option<String> = ctx.storage.get("new", &options).await.unwrap();
    assert_eq!(new.as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_snapshot_survives_serialization() {
    let ctx = setup().await;
    ctx.storage
        .set("k", "v", &StorageOptions::new().namespace("u1").encrypted())
        .await
        .unwrap();

    let backup = ctx.migrator().create_backup(Some("u1")).await.unwrap();
    let text = serde_json::to_string(&backup).unwrap();
    let back: BackupSnapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(back, backup);
}

#[tokio::test]
async fn test_invalid_namespace_backup() {
    let ctx = setup().await;
    let err = ctx.migrator().create_backup(Some("a:b")).await.unwrap_err();
    assert!(err.is_validation_error());
}
