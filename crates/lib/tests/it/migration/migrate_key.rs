use std::sync::Arc;
use std::time::Duration;

use coffer::{Clock, migration::MigrationOutcome, storage::StorageOptions};
use serde_json::{Value, json};

use crate::helpers::{
    FailingStore, MisreadingCipher, TamperingStore, plain_envelope, setup, setup_with,
    setup_with_store, test_store,
};

#[tokio::test]
async fn test_migrate_twice() {
    let ctx = setup().await;
    let migrator = ctx.migrator();
    let value = json!({"accounts": [{"id": 1, "balance": 12.5}], "currency": "EUR"});
    ctx.put_legacy("portfolio", &value).await;

    let first = migrator.migrate_key("portfolio", &StorageOptions::new()).await;
    assert_eq!(first.outcome, MigrationOutcome::Migrated);
    let second = migrator.migrate_key("portfolio", &StorageOptions::new()).await;
    assert_eq!(second.outcome, MigrationOutcome::AlreadyMigrated);

    let read: Option<Value> = ctx
        .storage
        .get("portfolio", &StorageOptions::new().encrypted())
        .await
        .unwrap();
    assert_eq!(read, Some(value));
    assert!(!ctx.raw("portfolio").await.unwrap().contains("EUR"));
}

#[tokio::test]
async fn test_absent_key_is_skipped() {
    let ctx = setup().await;
    let report = ctx
        .migrator()
        .migrate_key("missing", &StorageOptions::new())
        .await;
    assert_eq!(report.outcome, MigrationOutcome::SkippedAbsent);
    assert!(ctx.raw("missing").await.is_none());
}

#[tokio::test]
async fn test_expired_plaintext_is_deleted_and_skipped() {
    let ctx = setup().await;
    ctx.store
        .set("stale", plain_envelope(&json!("x"), Some(1)))
        .await
        .unwrap();

    let report = ctx.migrator().migrate_key("stale", &StorageOptions::new()).await;
    assert_eq!(report.outcome, MigrationOutcome::SkippedAbsent);
    assert!(ctx.raw("stale").await.is_none());
}

#[tokio::test]
async fn test_deadline_is_preserved() {
    let ctx = setup().await;
    let options = StorageOptions::new().expires_in(Duration::from_secs(60));
    ctx.storage.set("session", "s-1", &options).await.unwrap();
    let before: Value = serde_json::from_str(&ctx.raw("session").await.unwrap()).unwrap();

    ctx.clock.advance(10_000);
    let report = ctx.migrator().migrate_key("session", &StorageOptions::new()).await;
    assert_eq!(report.outcome, MigrationOutcome::Migrated);

    let after: Value = serde_json::from_str(&ctx.raw("session").await.unwrap()).unwrap();
    assert_eq!(after["expiresAt"], before["expiresAt"]);

    let encrypted = StorageOptions::new().encrypted();
    let read: Option<String> = ctx.storage.get("session", &encrypted).await.unwrap();
    assert_eq!(read.as_deref(), Some("s-1"));

    ctx.clock.advance(50_001);
    let read: Option<String> = ctx.storage.get("session", &encrypted).await.unwrap();
    assert_eq!(read, None);
}

#[tokio::test]
async fn test_expires_in_replaces_deadline() {
    let ctx = setup().await;
    ctx.put_legacy("k", &json!(1)).await;

    let options = StorageOptions::new().expires_in(Duration::from_secs(5));
    ctx.migrator().migrate_key("k", &options).await;

    let after: Value = serde_json::from_str(&ctx.raw("k").await.unwrap()).unwrap();
    assert_eq!(after["expiresAt"], json!(ctx.clock.now_millis() + 5_000));

    let rollback = ctx.migrator().rollback_migration("k", &StorageOptions::new()).await;
    assert!(rollback.is_ok());
    assert_eq!(ctx.storage.get::<i32>("k", &StorageOptions::new()).await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_verification_failure_keeps_plaintext() {
    let cipher = Arc::new(MisreadingCipher::default());
    let ctx = setup_with(test_store().await, cipher.clone()).await;
    ctx.put_legacy("budget", &json!({"limit": 400})).await;
    let before = ctx.raw("budget").await;
    cipher.arm();

    let report = ctx.migrator().migrate_key("budget", &StorageOptions::new()).await;
    assert_eq!(report.outcome, MigrationOutcome::Failed);
    assert!(report.error.unwrap().is_verification_error());

    assert_eq!(ctx.raw("budget").await, before);
    let read: Option<Value> = ctx
        .storage
        .get("budget", &StorageOptions::new())
        .await
        .unwrap();
    assert_eq!(read, Some(json!({"limit": 400})));
}

#[tokio::test]
async fn test_corrupted_write_keeps_plaintext() {
    let store = Arc::new(TamperingStore::new(test_store().await));
    let ctx = setup_with_store(store.clone()).await;
    ctx.put_legacy("iban", &json!("DE89370400440532013000")).await;
    let before = ctx.raw("iban").await;
    store.arm();

    let report = ctx.migrator().migrate_key("iban", &StorageOptions::new()).await;
    assert_eq!(report.outcome, MigrationOutcome::Failed);
    assert!(report.error.unwrap().is_authentication_error());
    assert_eq!(ctx.raw("iban").await, before);
}

#[tokio::test]
async fn test_failed_write_keeps_plaintext() {
    let store = Arc::new(FailingStore::new(test_store().await));
    let ctx = setup_with_store(store.clone()).await;
    ctx.put_legacy("k", &json!([1, 2, 3])).await;
    let before = ctx.raw("k").await;
    store.arm();

    let report = ctx.migrator().migrate_key("k", &StorageOptions::new()).await;
    assert_eq!(report.outcome, MigrationOutcome::Failed);
    assert!(report.error.unwrap().is_io_error());
    assert_eq!(ctx.raw("k").await, before);
}

#[tokio::test]
async fn test_undecodable_plaintext_fails_without_change() {
    let ctx = setup().await;
    let raw = json!({"kind": "plain", "value": "{oops", "createdAt": 0}).to_string();
    ctx.store.set("k", raw.clone()).await.unwrap();

    let report = ctx.migrator().migrate_key("k", &StorageOptions::new()).await;
    assert_eq!(report.outcome, MigrationOutcome::Failed);
    assert!(report.error.unwrap().is_malformed());
    assert_eq!(ctx.raw("k").await, Some(raw));
}

#[tokio::test]
async fn test_missing_key_fails_without_change() {
    let store = test_store().await;
    let storage = coffer::SecureStorage::builder(store.clone())
        .key_manager(Arc::new(coffer::crypto::KeyManager::disabled()))
        .build();
    store.set("k", plain_envelope(&json!(1), None)).await.unwrap();

    let report = coffer::Migrator::new(storage)
        .migrate_key("k", &StorageOptions::new())
        .await;
    assert_eq!(report.outcome, MigrationOutcome::Failed);
    assert!(report.error.unwrap().is_key_unavailable());
    assert!(store.get("k").await.unwrap().unwrap().contains("plain"));
}

#[tokio::test]
async fn test_concurrent_migrations_of_one_key() {
    let ctx = setup().await;
    ctx.put_legacy("wallet", &json!({"btc": "0.5"})).await;
    let a = ctx.migrator();
    let b = ctx.migrator();
    let options = StorageOptions::new();

    let (first, second) = tokio::join!(
        a.migrate_key("wallet", &options),
        b.migrate_key("wallet", &options)
    );
    for report in [&first, &second] {
        assert!(
            matches!(
                report.outcome,
                MigrationOutcome::Migrated | MigrationOutcome::AlreadyMigrated
            ),
            "{report:?}"
        );
    }
    assert!(a.is_migrated("wallet", &options).await.unwrap());

    let read: Option<Value> = ctx
        .storage
        .get("wallet", &options.clone().encrypted())
        .await
        .unwrap();
    assert_eq!(read, Some(json!({"btc": "0.5"})));
}

#[tokio::test]
async fn test_is_migrated_is_read_only() {
    let ctx = setup().await;
    let migrator = ctx.migrator();
    let options = StorageOptions::new();

    assert!(!migrator.is_migrated("k", &options).await.unwrap());

    ctx.store.set("k", "garbage".to_string()).await.unwrap();
    assert!(!migrator.is_migrated("k", &options).await.unwrap());
    assert_eq!(ctx.raw("k").await.as_deref(), Some("garbage"));

    ctx.storage.set("k", &1, &options).await.unwrap();
    assert!(!migrator.is_migrated("k", &options).await.unwrap());

    ctx.storage.set("k", &1, &options.clone().encrypted()).await.unwrap();
    assert!(migrator.is_migrated("k", &options).await.unwrap());
}
