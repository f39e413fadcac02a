use std::sync::Arc;

use coffer::{
    AutoMigration, Migrator, SecureStorage,
    storage::{StorageConfig, StorageOptions},
};
use serde_json::{Value, json};

use crate::helpers::{MisreadingCipher, setup, setup_with, test_store};

#[tokio::test]
async fn test_first_read_migrates_configured_key() {
    let ctx = setup().await;
    ctx.put_legacy("u1:session_token", &json!("tok-123")).await;
    ctx.put_legacy("u1:theme", &json!("dark")).await;
    let auto = AutoMigration::new(ctx.migrator(), ["session_token"]);
    let options = StorageOptions::new().namespace("u1");

    let token: Option<String> = auto.read("session_token", &options).await.unwrap();
    assert_eq!(token.as_deref(), Some("tok-123"));
    assert!(ctx.raw("u1:session_token").await.unwrap().contains("cipher"));

    let theme: Option<String> = auto.read("theme", &options).await.unwrap();
    assert_eq!(theme.as_deref(), Some("dark"));
    assert!(ctx.raw("u1:theme").await.unwrap().contains("plain"));
}

#[tokio::test]
async fn test_migration_is_attempted_once() {
    let ctx = setup().await;
    ctx.put_legacy("token", &json!("t")).await;
    let auto = AutoMigration::new(ctx.migrator(), ["token"]);
    let options = StorageOptions::new();

    auto.read::<String>("token", &options).await.unwrap();
    let migrated = ctx.raw("token").await;

    // A legacy writer puts plaintext back; this adapter does not try again.
    ctx.put_legacy("token", &json!("t2")).await;
    let token: Option<String> = auto.read("token", &options).await.unwrap();
    assert_eq!(token.as_deref(), Some("t2"));
    assert!(ctx.raw("token").await.unwrap().contains("plain"));
    assert_ne!(ctx.raw("token").await, migrated);
}

#[tokio::test]
async fn test_failed_migration_serves_plaintext() {
    let cipher = Arc::new(MisreadingCipher::default());
    let ctx = setup_with(test_store().await, cipher.clone()).await;
    ctx.put_legacy("token", &json!({"access": "a", "refresh": "r"})).await;
    cipher.arm();

    let auto = AutoMigration::new(ctx.migrator(), ["token"]);
    let token: Option<Value> = auto.read("token", &StorageOptions::new()).await.unwrap();
    assert_eq!(token, Some(json!({"access": "a", "refresh": "r"})));
    assert!(ctx.raw("token").await.unwrap().contains("plain"));
}

#[tokio::test]
async fn test_two_adapters_share_one_store() {
    let ctx = setup().await;
    ctx.put_legacy("token", &json!("shared")).await;
    let a = AutoMigration::new(ctx.migrator(), ["token"]);
    let b = AutoMigration::new(ctx.migrator(), ["token"]);
    let options = StorageOptions::new();

    let (ra, rb) = tokio::join!(
        a.read::<String>("token", &options),
        b.read::<String>("token", &options)
    );
    assert_eq!(ra.unwrap().as_deref(), Some("shared"));
    assert_eq!(rb.unwrap().as_deref(), Some("shared"));
    assert!(ctx.raw("token").await.unwrap().contains("cipher"));
}

#[tokio::test]
async fn test_keys_from_config() {
    let store = test_store().await;
    let storage = SecureStorage::builder(store)
        .config(StorageConfig {
            auto_migrate_keys: vec!["pin".to_string()],
            ..StorageConfig::default()
        })
        .build();
    let auto = AutoMigration::from_config(Migrator::new(storage));

    assert!(auto.is_configured("pin"));
    assert!(!auto.is_configured("theme"));

    auto.write("pin", &4321, &StorageOptions::new()).await.unwrap();
    assert_eq!(
        auto.storage()
            .get::<i32>("pin", &StorageOptions::new())
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        auto.read::<i32>("pin", &StorageOptions::new()).await.unwrap(),
        Some(4321)
    );
}
