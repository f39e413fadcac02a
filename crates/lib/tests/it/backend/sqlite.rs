use std::sync::Arc;

use coffer::{
    SecureStorage,
    backend::Sqlite,
    crypto::{KEY_LENGTH, KeyManager, SessionKey},
    migration::MigrationOutcome,
    storage::StorageOptions,
};
use serde_json::json;

#[tokio::test]
async fn test_encrypted_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coffer.db");
    let keys = Arc::new(KeyManager::with_key(SessionKey::from_bytes(
        [9u8; KEY_LENGTH],
    )));
    let options = StorageOptions::new().namespace("u1").encrypted();

    let store = Sqlite::open(&path).await.unwrap();
    let storage = SecureStorage::builder(Arc::new(store.clone()))
        .key_manager(keys.clone())
        .build();
    storage.set("token", "abc", &options).await.unwrap();
    store.close().await;

    let reopened = SecureStorage::builder(Arc::new(Sqlite::open(&path).await.unwrap()))
        .key_manager(keys)
        .build();
    let token: Option<String> = reopened.get("token", &options).await.unwrap();
    assert_eq!(token.as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_migration_over_sqlite() {
    let store = Arc::new(Sqlite::in_memory().await.unwrap());
    let ctx = crate::helpers::setup_with_store(store).await;
    for i in 0..3 {
        ctx.put_legacy(&format!("legacy:{i}"), &json!(i)).await;
    }

    let batch = ctx
        .migrator()
        .migrate_all_keys("legacy:", &Default::default())
        .await
        .unwrap();
    assert_eq!(batch.migrated_count, 3);
    assert!(batch
        .reports
        .iter()
        .all(|r| r.outcome == MigrationOutcome::Migrated));
}
