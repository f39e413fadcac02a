//! Migrate-on-first-read adapter.
//!
//! [`AutoMigration`] sits in front of a [`SecureStorage`] for a fixed set of
//! keys that should live encrypted. The first time such a key is read
//! through the adapter, a plaintext record left by an older version is
//! migrated in place. A failed migration is logged and the read still
//! returns the plaintext value.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Result,
    migration::{MigrationOutcome, Migrator},
    storage::{SecureStorage, StorageOptions},
};

/// Transparent migration for a configured set of logical keys.
///
/// Each adapter attempts a given key at most once. Separate adapters over the
/// same store may both attempt it; [`Migrator::migrate_key`] tolerates that.
#[derive(Debug)]
pub struct AutoMigration {
    migrator: Migrator,
    keys: HashSet<String>,
    /// Physical keys a migration has already been attempted for.
    attempted: Mutex<HashSet<String>>,
}

impl AutoMigration {
    pub fn new<I, K>(migrator: Migrator, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            migrator,
            keys: keys.into_iter().map(Into::into).collect(),
            attempted: Mutex::new(HashSet::new()),
        }
    }

    /// Build an adapter for the storage's configured `auto_migrate_keys`.
    pub fn from_config(migrator: Migrator) -> Self {
        let keys = migrator.storage().config().auto_migrate_keys.clone();
        Self::new(migrator, keys)
    }

    pub fn storage(&self) -> &SecureStorage {
        self.migrator.storage()
    }

    /// Whether `key` is one of the keys this adapter encrypts.
    pub fn is_configured(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Read `key`, migrating it first if this is its first read.
    ///
    /// Configured keys are always read with decryption enabled.
    pub async fn read<T>(&self, key: &str, options: &StorageOptions) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        if !self.is_configured(key) {
            return self.storage().get(key, options).await;
        }

        let options = options.clone().encrypted();
        let physical_key = self.storage().physical_key(key, &options)?;
        if self.mark_attempted(&physical_key) {
            self.migrate_once(key, &physical_key, &options).await;
        }

        self.storage().get(key, &options).await
    }

    /// Write `key`, sealing it if it is a configured key.
    pub async fn write<T>(&self, key: &str, value: &T, options: &StorageOptions) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if self.is_configured(key) {
            let options = options.clone().encrypted();
            self.storage().set(key, value, &options).await
        } else {
            self.storage().set(key, value, options).await
        }
    }

    async fn migrate_once(&self, key: &str, physical_key: &str, options: &StorageOptions) {
        match self.migrator.is_migrated(key, options).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(key = %physical_key, error = %e, "Could not check migration state");
                return;
            }
        }

        let report = self.migrator.migrate_key(key, options).await;
        match report.outcome {
            MigrationOutcome::Migrated => {
                tracing::info!(key = %physical_key, "Auto-migrated key on first read");
            }
            MigrationOutcome::SkippedAbsent => {
                // Nothing to migrate yet; a later read may find a legacy record.
                self.attempted_set().remove(physical_key);
            }
            MigrationOutcome::AlreadyMigrated => {}
            MigrationOutcome::Failed => {
                tracing::warn!(
                    key = %physical_key,
                    error = ?report.error,
                    "Auto-migration failed, serving stored value"
                );
            }
        }
    }

    /// Record an attempt for `physical_key`; `true` if this is the first.
    fn mark_attempted(&self, physical_key: &str) -> bool {
        self.attempted_set().insert(physical_key.to_string())
    }

    fn attempted_set(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.attempted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
