use std::collections::BTreeMap;

use coffer::storage::{ReadOutcome, StorageOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::helpers::setup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    id: u64,
    name: String,
    balance_cents: i64,
    tags: Vec<String>,
    limits: BTreeMap<String, f64>,
    closed: Option<bool>,
}

fn account() -> Account {
    Account {
        id: 7,
        name: "Checking ✓".to_string(),
        balance_cents: -1_250,
        tags: vec!["primary".to_string()],
        limits: BTreeMap::from([("daily".to_string(), 500.5)]),
        closed: None,
    }
}

#[tokio::test]
async fn test_encrypted_round_trip_of_struct() {
    let ctx = setup().await;
    let options = StorageOptions::new().encrypted();

    ctx.storage.set("account", &account(), &options).await.unwrap();
    let back: Option<Account> = ctx.storage.get("account", &options).await.unwrap();
    assert_eq!(back, Some(account()));
}

#[tokio::test]
async fn test_round_trip_of_json_values() {
    let ctx = setup().await;
    let values = [
        json!(null),
        json!(false),
        json!(0),
        json!(-3.25),
        json!(""),
        json!("with \"quotes\" and \\ slashes"),
        json!([]),
        json!({"nested": {"list": [1, {"x": null}]}}),
    ];

    for (i, value) in values.iter().enumerate() {
        for options in [StorageOptions::new(), StorageOptions::new().encrypted()] {
            let key = format!("v{i}");
            ctx.storage.set(&key, value, &options).await.unwrap();
            let back: Option<Value> = ctx.storage.get(&key, &options).await.unwrap();
            assert_eq!(back.as_ref(), Some(value), "value {value} with {options:?}");
        }
    }
}

#[tokio::test]
async fn test_stored_ciphertext_does_not_contain_plaintext() {
    let ctx = setup().await;
    ctx.storage
        .set("ssn", "078-05-1120", &StorageOptions::new().encrypted())
        .await
        .unwrap();

    let raw = ctx.raw("ssn").await.unwrap();
    assert!(!raw.contains("078-05-1120"));

    let envelope: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope["kind"], "cipher");
    for field in ["nonce", "ciphertext", "tag"] {
        assert!(envelope[field].is_string(), "missing {field}");
    }
}

#[tokio::test]
async fn test_plain_record_readable_with_decrypt_flag() {
    let ctx = setup().await;
    ctx.storage.set("locale", "en-GB", &StorageOptions::new()).await.unwrap();

    let locale: Option<String> = ctx
        .storage
        .get("locale", &StorageOptions::new().encrypted())
        .await
        .unwrap();
    assert_eq!(locale.as_deref(), Some("en-GB"));
}

#[tokio::test]
async fn test_cipher_record_without_decrypt_flag_is_not_destroyed() {
    let ctx = setup().await;
    ctx.storage
        .set("pin", &1234, &StorageOptions::new().encrypted())
        .await
        .unwrap();

    let pin: Option<i32> = ctx.storage.get("pin", &StorageOptions::new()).await.unwrap();
    assert_eq!(pin, None);
    assert!(ctx.raw("pin").await.is_some());

    let pin: Option<i32> = ctx
        .storage
        .get("pin", &StorageOptions::new().encrypted())
        .await
        .unwrap();
    assert_eq!(pin, Some(1234));
}

#[tokio::test]
async fn test_last_write_wins() {
    let ctx = setup().await;
    let options = StorageOptions::new().encrypted();
    ctx.storage.set("k", "first", &options).await.unwrap();
    ctx.storage.set("k", "second", &StorageOptions::new()).await.unwrap();

    let outcome = ctx.storage.read("k", &options).await.unwrap();
    assert_eq!(outcome, ReadOutcome::Found(json!("second")));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let ctx = setup().await;
    let options = StorageOptions::new();
    ctx.storage.set("k", &1, &options).await.unwrap();

    ctx.storage.remove("k", &options).await.unwrap();
    ctx.storage.remove("k", &options).await.unwrap();
    ctx.storage.remove("never-written", &options).await.unwrap();

    assert_eq!(ctx.storage.read("k", &options).await.unwrap(), ReadOutcome::Absent);
    assert!(ctx.raw("k").await.is_none());
}

#[tokio::test]
async fn test_get_or_and_contains() {
    let ctx = setup().await;
    let options = StorageOptions::new();

    assert_eq!(ctx.storage.get_or("retries", 3, &options).await.unwrap(), 3);
    assert!(!ctx.storage.contains("retries", &options).await.unwrap());

    ctx.storage.set("retries", &5, &options).await.unwrap();
    assert_eq!(ctx.storage.get_or("retries", 3, &options).await.unwrap(), 5);
    assert!(ctx.storage.contains("retries", &options).await.unwrap());
}

#[tokio::test]
async fn test_set_without_key_fails_only_when_encrypting() {
    let ctx = setup().await;
    let storage = coffer::SecureStorage::builder(ctx.store.clone())
        .key_manager(std::sync::Arc::new(coffer::crypto::KeyManager::disabled()))
        .build();

    let err = storage
        .set("token", "abc", &StorageOptions::new().encrypted())
        .await
        .unwrap_err();
    assert!(err.is_key_unavailable());
    assert!(ctx.raw("token").await.is_none());

    storage.set("theme", "dark", &StorageOptions::new()).await.unwrap();
    let theme: Option<String> = storage.get("theme", &StorageOptions::new()).await.unwrap();
    assert_eq!(theme.as_deref(), Some("dark"));
}

#[tokio::test]
async fn test_read_of_sealed_record_without_key_is_an_error() {
    let ctx = setup().await;
    ctx.storage
        .set("token", "abc", &StorageOptions::new().encrypted())
        .await
        .unwrap();

    let storage = coffer::SecureStorage::builder(ctx.store.clone())
        .key_manager(std::sync::Arc::new(coffer::crypto::KeyManager::disabled()))
        .build();
    let err = storage
        .get::<String>("token", &StorageOptions::new().encrypted())
        .await
        .unwrap_err();
    assert!(err.is_key_unavailable());
    assert!(ctx.raw("token").await.is_some());
}
