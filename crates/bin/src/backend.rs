//! Record store creation and persistence.

use std::path::PathBuf;
use std::sync::Arc;

use coffer::{
    SecureStorage,
    backend::{InMemory, RecordStore, Sqlite},
    crypto::KeyManager,
};

use crate::cli::{Backend, BackendConfig};

fn data_dir(config: &BackendConfig) -> PathBuf {
    config.data_dir.clone().unwrap_or_else(|| PathBuf::from("."))
}

fn json_path(config: &BackendConfig) -> PathBuf {
    data_dir(config).join("coffer.json")
}

/// Human-readable name of the configured store
pub fn backend_label(config: &BackendConfig) -> &'static str {
    match config.backend {
        Backend::Sqlite => "sqlite",
        Backend::Inmemory => "inmemory",
    }
}

/// Open the record store described by `config`
pub async fn create_store(
    config: &BackendConfig,
) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    let data_dir = data_dir(config);
    tokio::fs::create_dir_all(&data_dir).await?;

    match config.backend {
        Backend::Sqlite => {
            let db_path = data_dir.join("coffer.db");
            tracing::info!("Using SQLite store at {}", db_path.display());
            Ok(Arc::new(Sqlite::open(&db_path).await?))
        }
        Backend::Inmemory => {
            let path = json_path(config);
            tracing::info!("Using in-memory store persisted at {}", path.display());
            Ok(Arc::new(InMemory::load_from_file(&path).await?))
        }
    }
}

/// Open storage over the configured store without any session key.
pub async fn open_storage(
    config: &BackendConfig,
) -> Result<SecureStorage, Box<dyn std::error::Error>> {
    let store = create_store(config).await?;
    Ok(SecureStorage::builder(store)
        .key_manager(Arc::new(KeyManager::disabled()))
        .build())
}

/// Write an in-memory store back to its file. SQLite writes through already.
pub async fn persist(
    config: &BackendConfig,
    storage: &SecureStorage,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(in_memory) = storage.store().as_any().downcast_ref::<InMemory>() {
        let path = json_path(config);
        in_memory.save_to_file(&path).await?;
        tracing::info!("Saved store to {}", path.display());
    }
    Ok(())
}
