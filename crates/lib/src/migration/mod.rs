//!
//! Plaintext-to-encrypted migration.
//!
//! A [`Migrator`] upgrades records written in plaintext by older application
//! versions into sealed records, one key at a time. Every migration is
//! verified by reading the new record back and comparing it with the
//! original value; on any failure the original stored string is written back,
//! so a migration can fail but can not lose data.
//!
//! Migrations take no locks. Running [`Migrator::migrate_key`] twice on the
//! same key, concurrently or not, leaves one encrypted record.

mod backup;
mod errors;
mod report;

use serde_json::Value;

pub use backup::BackupSnapshot;
pub use errors::MigrationError;
pub use report::{
    BatchReport, MigrationOutcome, MigrationReport, RollbackOutcome, RollbackReport,
};

use crate::{
    Result,
    codec,
    storage::{
        SecureStorage, StorageOptions, expiry_deadline,
        record::{self, Payload, StorageRecord},
    },
};

/// Options for a prefix-wide migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Namespace and TTL applied to each key.
    pub storage: StorageOptions,
    /// Snapshot the namespace before touching any record.
    pub backup: bool,
}

impl MigrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Migrate keys in `namespace`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.storage = self.storage.namespace(namespace);
        self
    }

    /// Take a [`BackupSnapshot`] of the namespace first and return it in the
    /// [`BatchReport`].
    pub fn with_backup(mut self) -> Self {
        self.backup = true;
        self
    }
}

impl From<StorageOptions> for MigrationOptions {
    fn from(storage: StorageOptions) -> Self {
        Self {
            storage,
            backup: false,
        }
    }
}

/// Converts plaintext records of a [`SecureStorage`] into encrypted ones.
#[derive(Clone, Debug)]
pub struct Migrator {
    storage: SecureStorage,
}

impl Migrator {
    pub fn new(storage: SecureStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &SecureStorage {
        &self.storage
    }

    /// Migrate one key to encrypted storage.
    ///
    /// Never returns an error: every failure is captured in the report, and
    /// a failed report means the stored record is the one that was there
    /// before the call. An `expires_in` in `options` replaces the record's
    /// deadline; otherwise the original deadline is kept.
    pub async fn migrate_key(&self, key: &str, options: &StorageOptions) -> MigrationReport {
        let namespace = match self.storage.resolve_namespace(options) {
            Ok(namespace) => namespace,
            Err(e) => {
                let namespace = options.namespace.clone().unwrap_or_default();
                return MigrationReport::failed(key, &namespace, e);
            }
        };

        let report = match self.migrate_in_namespace(&namespace, key, options).await {
            Ok(outcome) => MigrationReport::new(key, &namespace, outcome),
            Err(e) => MigrationReport::failed(key, &namespace, e),
        };

        match &report.error {
            Some(e) => tracing::warn!(key = %key, namespace = %namespace, error = %e, "Migration failed"),
            None => tracing::debug!(key = %key, namespace = %namespace, outcome = ?report.outcome, "Migrated key"),
        }
        report
    }

    async fn migrate_in_namespace(
        &self,
        namespace: &str,
        key: &str,
        options: &StorageOptions,
    ) -> Result<MigrationOutcome> {
        let physical_key = self.storage.physical_key(key, options)?;
        let store = self.storage.store();

        let Some(raw) = store.get(&physical_key).await? else {
            return Ok(MigrationOutcome::SkippedAbsent);
        };
        let source = StorageRecord::from_raw(namespace, key, &raw)?;

        let now = self.storage.now_millis();
        if source.is_expired(now) {
            store.remove(&physical_key).await?;
            return Ok(MigrationOutcome::SkippedAbsent);
        }

        let text = match &source.payload {
            Payload::Cipher { .. } => return Ok(MigrationOutcome::AlreadyMigrated),
            Payload::Plain { value } => value.clone(),
        };
        let original: Value = codec::decode(&text)?;
        let expires_at = expiry_deadline(now, options.expires_in).or(source.expires_at);

        let replacement = StorageRecord {
            namespace: namespace.to_string(),
            key: key.to_string(),
            payload: self.storage.seal_text(&physical_key, expires_at, &text)?,
            expires_at,
            created_at: now,
        };

        // The replacement shares the physical key with the source, so the
        // source is only ever overwritten, never deleted separately.
        if let Err(e) = self.write_and_verify(&replacement, &original).await {
            self.restore_source(&physical_key, &raw, &original).await;
            return Err(e);
        }

        Ok(MigrationOutcome::Migrated)
    }

    async fn write_and_verify(&self, replacement: &StorageRecord, original: &Value) -> Result<()> {
        self.storage.write_record(replacement).await?;
        self.verify(&replacement.physical_key(), original).await
    }

    /// Read `physical_key` back without the purge policy and check it is a
    /// sealed record holding `expected`.
    async fn verify(&self, physical_key: &str, expected: &Value) -> Result<()> {
        let mismatch = |reason: &str| MigrationError::VerificationMismatch {
            key: physical_key.to_string(),
            reason: reason.to_string(),
        };

        let raw = self
            .storage
            .store()
            .get(physical_key)
            .await?
            .ok_or_else(|| mismatch("record missing after write"))?;
        let envelope = record::parse_envelope(&raw)?;
        if !envelope.payload.is_encrypted() {
            return Err(mismatch("record is not encrypted").into());
        }

        let text = self
            .storage
            .open_text(physical_key, envelope.expires_at, &envelope.payload)?;
        let actual: Value = codec::decode(&text)?;
        if &actual != expected {
            return Err(mismatch("decrypted value differs from original").into());
        }
        Ok(())
    }

    /// Put the original stored string back after a failed migration, unless
    /// the key now holds a verified replacement written by someone else.
    async fn restore_source(&self, physical_key: &str, raw: &str, original: &Value) {
        if self.verify(physical_key, original).await.is_ok() {
            return;
        }

        match self
            .storage
            .store()
            .set(physical_key, raw.to_string())
            .await
        {
            Ok(()) => tracing::debug!(key = %physical_key, "Restored original record"),
            Err(e) => tracing::error!(
                key = %physical_key,
                error = %e,
                "Failed to restore original record after migration failure"
            ),
        }
    }

    /// Migrate `keys` in order. One key's failure never stops the batch.
    pub async fn migrate_to_secure_storage<I, K>(
        &self,
        keys: I,
        options: &StorageOptions,
    ) -> BatchReport
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut batch = BatchReport::default();
        for key in keys {
            batch.push(self.migrate_key(key.as_ref(), options).await);
        }

        tracing::info!(
            migrated = batch.migrated_count,
            skipped = batch.skipped_count,
            failed = batch.failed_count,
            "Migration batch complete"
        );
        batch
    }

    /// Migrate every key in the options' namespace whose logical name starts
    /// with `prefix`.
    ///
    /// In the global namespace `prefix` is matched against raw host keys, so
    /// flat legacy keys such as `legacy:theme` are picked up as they are.
    ///
    /// # Errors
    /// Only if the namespace is invalid or the keys or backup can not be
    /// read; per-key failures are reported in the batch.
    pub async fn migrate_all_keys(
        &self,
        prefix: &str,
        options: &MigrationOptions,
    ) -> Result<BatchReport> {
        let namespace = self.storage.resolve_namespace(&options.storage)?;
        let namespace_prefix = record::namespace_prefix(&namespace);

        let physical = self
            .storage
            .store()
            .keys_with_prefix(&format!("{namespace_prefix}{prefix}"))
            .await?;
        let keys: Vec<&str> = physical
            .iter()
            .filter_map(|key| key.strip_prefix(namespace_prefix.as_str()))
            .collect();

        let backup = if options.backup {
            Some(self.create_backup(Some(&namespace)).await?)
        } else {
            None
        };

        tracing::info!(
            namespace = %namespace,
            prefix = %prefix,
            count = keys.len(),
            "Migrating keys by prefix"
        );
        let mut batch = self
            .migrate_to_secure_storage(keys, &options.storage)
            .await;
        batch.backup = backup;
        Ok(batch)
    }

    /// Whether the live record under `key` is encrypted.
    ///
    /// Read-only: absent, expired, plaintext, and unparseable records all
    /// report `false` and are left untouched.
    pub async fn is_migrated(&self, key: &str, options: &StorageOptions) -> Result<bool> {
        let physical_key = self.storage.physical_key(key, options)?;
        let Some(raw) = self.storage.store().get(&physical_key).await? else {
            return Ok(false);
        };
        let Ok(envelope) = record::parse_envelope(&raw) else {
            return Ok(false);
        };
        let now = self.storage.now_millis();
        let expired = envelope.expires_at.is_some_and(|deadline| now > deadline);
        Ok(envelope.payload.is_encrypted() && !expired)
    }

    /// Snapshot the raw records of `namespace`.
    ///
    /// `None` uses the storage's default namespace. A snapshot of the global
    /// namespace covers every record in the store.
    pub async fn create_backup(&self, namespace: Option<&str>) -> Result<BackupSnapshot> {
        let namespace = self.storage.namespace_or_default(namespace)?;
        let prefix = record::namespace_prefix(&namespace);
        let store = self.storage.store();

        let mut snapshot = BackupSnapshot {
            namespace: namespace.clone(),
            created_at: self.storage.clock().now_rfc3339(),
            ..BackupSnapshot::default()
        };
        for physical_key in store.keys_with_prefix(&prefix).await? {
            if let Some(raw) = store.get(&physical_key).await? {
                snapshot.records.insert(physical_key, raw);
            }
        }

        tracing::info!(namespace = %namespace, records = snapshot.len(), "Created backup");
        Ok(snapshot)
    }

    /// Write every record of `snapshot` back verbatim.
    ///
    /// Records created after the snapshot are left in place.
    pub async fn restore_backup(&self, snapshot: &BackupSnapshot) -> Result<usize> {
        let store = self.storage.store();
        for (physical_key, raw) in &snapshot.records {
            store.set(physical_key, raw.clone()).await?;
        }

        tracing::info!(
            namespace = %snapshot.namespace,
            records = snapshot.len(),
            "Restored backup"
        );
        Ok(snapshot.len())
    }

    /// Turn an encrypted record back into plaintext.
    ///
    /// The decrypted text must decode before it is written. The record keeps
    /// its expiration deadline.
    ///
    /// # Errors
    /// Unlike reads, rollback never deletes: a record that can not be opened
    /// or decoded is left as it is and the error is returned.
    pub async fn rollback_migration(
        &self,
        key: &str,
        options: &StorageOptions,
    ) -> Result<RollbackReport> {
        let namespace = self.storage.resolve_namespace(options)?;
        let physical_key = self.storage.physical_key(key, options)?;
        let store = self.storage.store();
        let report = |outcome| RollbackReport {
            key: key.to_string(),
            namespace: namespace.clone(),
            outcome,
        };

        let Some(raw) = store.get(&physical_key).await? else {
            return Ok(report(RollbackOutcome::SkippedAbsent));
        };
        let source = StorageRecord::from_raw(&namespace, key, &raw)?;

        let now = self.storage.now_millis();
        if source.is_expired(now) {
            store.remove(&physical_key).await?;
            return Ok(report(RollbackOutcome::SkippedAbsent));
        }
        if !source.is_encrypted() {
            return Ok(report(RollbackOutcome::AlreadyRolledBack));
        }

        let text = self
            .storage
            .open_text(&physical_key, source.expires_at, &source.payload)?;
        codec::decode::<Value>(&text)?;

        let plain = StorageRecord {
            payload: Payload::Plain { value: text },
            created_at: now,
            ..source
        };
        self.storage.write_record(&plain).await?;

        tracing::info!(key = %physical_key, "Rolled back migration");
        Ok(report(RollbackOutcome::RolledBack))
    }
}
