//! In-memory record store implementation
//!
//! This module provides an in-memory implementation of the RecordStore trait,
//! suitable for testing, development, or hosts that persist the whole store
//! themselves via `save_to_file`/`load_from_file`.

mod persistence;

use std::any::Any;
use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;
use crate::backend::RecordStore;

/// A simple in-memory record store backed by an ordered map.
///
/// The `BTreeMap` keeps keys sorted so prefix enumeration is a range scan.
///
/// **Security Note**: values are held exactly as the engine wrote them. Records
/// written without encryption are plaintext in memory and in any saved file.
#[derive(Debug, Default)]
pub struct InMemory {
    records: RwLock<BTreeMap<String, String>>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a store pre-populated with raw records.
    pub fn from_records(records: BTreeMap<String, String>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Returns a copy of every stored record.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.records.read().await.clone()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Saves every record to a specified file as JSON.
    ///
    /// # Arguments
    /// * `path` - The path to the file where the state should be saved.
    ///
    /// # Returns
    /// A `Result` indicating success or an I/O or serialization error.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads records from a specified JSON file.
    ///
    /// If the file does not exist, a new, empty `InMemory` store is returned.
    ///
    /// # Arguments
    /// * `path` - The path to the file from which to load the state.
    ///
    /// # Returns
    /// A `Result` containing the loaded store or an I/O or deserialization error.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load_from_file(path).await
    }
}

#[async_trait]
impl RecordStore for InMemory {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.records.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
