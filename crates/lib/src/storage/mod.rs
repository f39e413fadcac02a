//!
//! Secure key-value storage over a [`RecordStore`].
//!
//! [`SecureStorage`] stores serde values as JSON envelopes, optionally sealed
//! with the session key, under a namespace and with an optional time-to-live.
//!
//! ## Read policy
//!
//! Reads never fail because of what is stored. A record that has expired is
//! deleted and reported absent. A record that can not be authenticated,
//! decrypted, or parsed is deleted, logged, and reported absent. The
//! [`ReadOutcome`] returned by [`SecureStorage::read`] keeps these cases apart
//! for callers that need to know.
//!
//! ## Example
//!
//! ```
//! # use std::time::Duration;
//! # use coffer::{SecureStorage, StorageOptions, backend::InMemory};
//! # #[tokio::main]
//! # async fn main() -> coffer::Result<()> {
//! let storage = SecureStorage::new(InMemory::new());
//!
//! let options = StorageOptions::new()
//!     .namespace("user-42")
//!     .encrypted()
//!     .expires_in(Duration::from_secs(3600));
//! storage.set("session_token", "eyJhbGciOi", &options).await?;
//!
//! let token: Option<String> = storage.get("session_token", &options).await?;
//! assert_eq!(token.as_deref(), Some("eyJhbGciOi"));
//! # Ok(())
//! # }
//! ```

mod config;
mod errors;
pub mod record;

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

pub use config::StorageConfig;
pub use errors::StorageError;
use record::{NAMESPACE_SEPARATOR, Payload, StorageRecord};

use crate::{
    Result,
    backend::RecordStore,
    clock::{Clock, SystemClock},
    codec,
    crypto::{Aes256GcmProvider, CipherProvider, KeyManager, Sealed},
};

/// Per-call storage options.
///
/// `encrypt` doubles as "decrypt" on reads: a sealed record is only opened
/// when the read asks for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageOptions {
    /// Namespace override; `None` uses the storage's default namespace.
    pub namespace: Option<String>,
    /// Seal on write and open on read.
    pub encrypt: bool,
    /// Time-to-live from the moment of the write.
    pub expires_in: Option<Duration>,
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address records in `namespace`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Seal on write and open on read.
    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    /// Expire records `ttl` after they are written.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }
}

/// Why a record was deleted by a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeReason {
    /// The authentication tag did not verify.
    Authentication,
    /// The sealed payload could not be opened for another reason.
    Decryption,
    /// The envelope or the value inside it could not be parsed.
    Malformed,
}

/// Result of a single read, before it is collapsed to `Option`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A live record decoded to this value.
    Found(Value),
    /// Nothing is stored under the key.
    Absent,
    /// The record had expired and was deleted.
    Expired,
    /// The record is encrypted and the read did not ask for decryption.
    Sealed,
    /// The record was unreadable and was deleted.
    Purged { reason: PurgeReason },
}

impl ReadOutcome {
    /// The decoded value, if one was found.
    pub fn into_value(self) -> Option<Value> {
        match self {
            ReadOutcome::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Whether a live record exists after this read.
    pub fn is_present(&self) -> bool {
        matches!(self, ReadOutcome::Found(_) | ReadOutcome::Sealed)
    }
}

pub(crate) struct StorageInternal {
    store: Arc<dyn RecordStore>,
    keys: Arc<KeyManager>,
    cipher: Arc<dyn CipherProvider>,
    clock: Arc<dyn Clock>,
    config: StorageConfig,
}

impl std::fmt::Debug for StorageInternal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageInternal")
            .field("store", &self.store)
            .field("keys", &self.keys)
            .field("cipher", &self.cipher.algorithm())
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish()
    }
}

/// Encrypted-at-rest key-value storage.
///
/// `SecureStorage` is a cheap-to-clone handle; clones share the record store,
/// the session key, and the clock.
#[derive(Clone, Debug)]
pub struct SecureStorage {
    inner: Arc<StorageInternal>,
}

/// Builder for [`SecureStorage`] with injectable collaborators.
///
/// Anything not supplied falls back to a fresh [`KeyManager`],
/// [`Aes256GcmProvider`], [`SystemClock`], and [`StorageConfig::default`].
#[derive(Debug)]
pub struct SecureStorageBuilder {
    store: Arc<dyn RecordStore>,
    keys: Option<Arc<KeyManager>>,
    cipher: Option<Arc<dyn CipherProvider>>,
    clock: Option<Arc<dyn Clock>>,
    config: StorageConfig,
}

impl SecureStorageBuilder {
    /// Share a key manager with other storage handles.
    pub fn key_manager(mut self, keys: Arc<KeyManager>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn cipher(mut self, cipher: Arc<dyn CipherProvider>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Use `clock` for write timestamps and expiration.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SecureStorage {
        SecureStorage {
            inner: Arc::new(StorageInternal {
                store: self.store,
                keys: self.keys.unwrap_or_default(),
                cipher: self
                    .cipher
                    .unwrap_or_else(|| Arc::new(Aes256GcmProvider)),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                config: self.config,
            }),
        }
    }
}

impl SecureStorage {
    /// Open storage over `store` with a new session key and default settings.
    pub fn new(store: impl RecordStore) -> Self {
        Self::builder(Arc::new(store)).build()
    }

    /// Start building storage over a shared record store.
    pub fn builder(store: Arc<dyn RecordStore>) -> SecureStorageBuilder {
        SecureStorageBuilder {
            store,
            keys: None,
            cipher: None,
            clock: None,
            config: StorageConfig::default(),
        }
    }

    /// The underlying record store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.inner.keys
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    /// Store `value` under `key`.
    ///
    /// # Errors
    /// - [`CryptoError::KeyUnavailable`](crate::crypto::CryptoError::KeyUnavailable)
    ///   if encryption is requested and no session key can be produced
    /// - [`StorageError`] for an invalid namespace or key
    /// - [`CodecError::Unencodable`](crate::codec::CodecError::Unencodable)
    ///   if the value has no JSON form
    pub async fn set<T>(&self, key: &str, value: &T, options: &StorageOptions) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let namespace = self.resolve_namespace(options)?;
        validate_key(key)?;

        let text = codec::encode(value)?;
        let now = self.now_millis();
        let physical_key = record::physical_key(&namespace, key);

        let expires_at = expiry_deadline(now, options.expires_in);

        let payload = if options.encrypt {
            self.seal_text(&physical_key, expires_at, &text)?
        } else {
            Payload::Plain { value: text }
        };

        let record = StorageRecord {
            namespace,
            key: key.to_string(),
            payload,
            expires_at,
            created_at: now,
        };
        self.write_record(&record).await?;

        tracing::debug!(
            key = %physical_key,
            encrypted = options.encrypt,
            expires_at = ?record.expires_at,
            "Stored record"
        );
        Ok(())
    }

    /// Fetch the value under `key`, or `None` if there is no readable live
    /// record.
    ///
    /// Expired and unreadable records are deleted as a side effect; see
    /// [`read`](Self::read). A stored value whose shape does not match `T`
    /// is reported as `None` and left in place.
    pub async fn get<T>(&self, key: &str, options: &StorageOptions) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(value) = self.read(key, options).await?.into_value() else {
            return Ok(None);
        };

        match codec::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) if e.is_malformed() => {
                tracing::warn!(key = %key, error = %e, "Stored value has an unexpected shape");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the value under `key`, falling back to `default`.
    pub async fn get_or<T>(&self, key: &str, default: T, options: &StorageOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        Ok(self.get(key, options).await?.unwrap_or(default))
    }

    /// Read `key` and report exactly what was found.
    ///
    /// # Errors
    /// Only for invalid input, record store failures, or a missing session
    /// key when a sealed record must be opened. Stored content never causes
    /// an error.
    pub async fn read(&self, key: &str, options: &StorageOptions) -> Result<ReadOutcome> {
        let namespace = self.resolve_namespace(options)?;
        validate_key(key)?;
        let physical_key = record::physical_key(&namespace, key);

        let Some(raw) = self.inner.store.get(&physical_key).await? else {
            return Ok(ReadOutcome::Absent);
        };

        let record = match StorageRecord::from_raw(&namespace, key, &raw) {
            Ok(record) => record,
            Err(e) if e.is_malformed() => {
                return self.purge(&physical_key, PurgeReason::Malformed).await;
            }
            Err(e) => return Err(e),
        };

        if record.is_expired(self.now_millis()) {
            self.inner.store.remove(&physical_key).await?;
            tracing::debug!(key = %physical_key, "Removed expired record");
            return Ok(ReadOutcome::Expired);
        }

        let text = match &record.payload {
            Payload::Plain { value } => value.clone(),
            Payload::Cipher { .. } if !options.encrypt => return Ok(ReadOutcome::Sealed),
            Payload::Cipher { .. } => match self.open_text(&physical_key, record.expires_at, &record.payload) {
                Ok(text) => text,
                Err(e) if e.is_authentication_error() => {
                    return self
                        .purge(&physical_key, PurgeReason::Authentication)
                        .await;
                }
                Err(e) if e.is_corruption() => {
                    return self.purge(&physical_key, PurgeReason::Decryption).await;
                }
                Err(e) => return Err(e),
            },
        };

        match codec::decode::<Value>(&text) {
            Ok(value) => Ok(ReadOutcome::Found(value)),
            Err(e) if e.is_malformed() => self.purge(&physical_key, PurgeReason::Malformed).await,
            Err(e) => Err(e),
        }
    }

    /// Whether a live record exists under `key`.
    ///
    /// A sealed record counts as present even when `options` do not ask for
    /// decryption.
    pub async fn contains(&self, key: &str, options: &StorageOptions) -> Result<bool> {
        Ok(self.read(key, options).await?.is_present())
    }

    /// Delete the record under `key`. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str, options: &StorageOptions) -> Result<()> {
        let namespace = self.resolve_namespace(options)?;
        validate_key(key)?;
        let physical_key = record::physical_key(&namespace, key);
        self.inner.store.remove(&physical_key).await?;
        tracing::debug!(key = %physical_key, "Removed record");
        Ok(())
    }

    /// Logical keys stored in `namespace`, in ascending order.
    ///
    /// `None` uses the default namespace. The global namespace only owns
    /// keys without a separator; records of named namespaces are not listed.
    pub async fn keys(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        let namespace = self.namespace_or_default(namespace)?;
        Ok(self
            .owned_physical_keys(&namespace)
            .await?
            .iter()
            .filter_map(|key| record::logical_key(&namespace, key))
            .map(str::to_string)
            .collect())
    }

    /// Delete every expired record in `namespace` and return how many were
    /// removed.
    ///
    /// Records that can not be parsed are left for the read path to handle.
    pub async fn purge_expired(&self, namespace: Option<&str>) -> Result<usize> {
        let namespace = self.namespace_or_default(namespace)?;
        let now = self.now_millis();

        let mut removed = 0;
        for physical_key in self.owned_physical_keys(&namespace).await? {
            let Some(raw) = self.inner.store.get(&physical_key).await? else {
                continue;
            };
            let Ok(envelope) = record::parse_envelope(&raw) else {
                continue;
            };
            if envelope.expires_at.is_some_and(|deadline| now > deadline) {
                self.inner.store.remove(&physical_key).await?;
                removed += 1;
            }
        }

        tracing::debug!(namespace = %namespace, removed, "Purged expired records");
        Ok(removed)
    }

    /// Delete every record in `namespace` and return how many were removed.
    ///
    /// Clearing the global namespace leaves every named namespace intact.
    pub async fn clear(&self, namespace: Option<&str>) -> Result<usize> {
        let namespace = self.namespace_or_default(namespace)?;
        let keys = self.owned_physical_keys(&namespace).await?;
        for physical_key in &keys {
            self.inner.store.remove(physical_key).await?;
        }
        tracing::debug!(namespace = %namespace, removed = keys.len(), "Cleared namespace");
        Ok(keys.len())
    }

    /// Physical record-store key for `key` under `options`.
    pub fn physical_key(&self, key: &str, options: &StorageOptions) -> Result<String> {
        let namespace = self.resolve_namespace(options)?;
        validate_key(key)?;
        Ok(record::physical_key(&namespace, key))
    }

    /// Namespace the options address, after defaults and validation.
    pub(crate) fn resolve_namespace(&self, options: &StorageOptions) -> Result<String> {
        self.namespace_or_default(options.namespace.as_deref())
    }

    pub(crate) fn namespace_or_default(&self, namespace: Option<&str>) -> Result<String> {
        let namespace = namespace.unwrap_or(&self.inner.config.default_namespace);
        validate_namespace(namespace)?;
        Ok(namespace.to_string())
    }

    /// Physical keys owned by `namespace`, in ascending order.
    async fn owned_physical_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let prefix = record::namespace_prefix(namespace);
        let mut keys = self.inner.store.keys_with_prefix(&prefix).await?;
        keys.retain(|key| record::logical_key(namespace, key).is_some());
        Ok(keys)
    }

    pub(crate) fn now_millis(&self) -> u64 {
        self.inner.clock.now_millis()
    }

    /// Seal codec text for `physical_key` and its deadline with the session
    /// key.
    pub(crate) fn seal_text(
        &self,
        physical_key: &str,
        expires_at: Option<u64>,
        text: &str,
    ) -> Result<Payload> {
        let key = self.inner.keys.current_key()?;
        let aad = record::associated_data(physical_key, expires_at);
        let sealed = self.inner.cipher.seal(key, &aad, text.as_bytes())?;
        Ok(Payload::from(sealed))
    }

    /// Open a payload back to codec text. Plain payloads pass through.
    pub(crate) fn open_text(
        &self,
        physical_key: &str,
        expires_at: Option<u64>,
        payload: &Payload,
    ) -> Result<String> {
        let (nonce, ciphertext, tag) = match payload {
            Payload::Plain { value } => return Ok(value.clone()),
            Payload::Cipher {
                nonce,
                ciphertext,
                tag,
            } => (nonce, ciphertext, tag),
        };

        let key = self.inner.keys.current_key()?;
        let sealed = Sealed {
            nonce: nonce.clone(),
            ciphertext: ciphertext.clone(),
            tag: tag.clone(),
        };
        let aad = record::associated_data(physical_key, expires_at);
        let bytes = self.inner.cipher.open(key, &aad, &sealed)?;

        String::from_utf8(bytes).map_err(|e| {
            crate::crypto::CryptoError::Decryption {
                reason: format!("Plaintext is not UTF-8: {e}"),
            }
            .into()
        })
    }

    pub(crate) async fn write_record(&self, record: &StorageRecord) -> Result<()> {
        let raw = record.to_raw()?;
        self.inner.store.set(&record.physical_key(), raw).await
    }

    async fn purge(&self, physical_key: &str, reason: PurgeReason) -> Result<ReadOutcome> {
        self.inner.store.remove(physical_key).await?;
        tracing::warn!(key = %physical_key, ?reason, "Purged unreadable record");
        Ok(ReadOutcome::Purged { reason })
    }
}

pub(crate) fn expiry_deadline(now_millis: u64, ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|ttl| {
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        now_millis.saturating_add(ttl_millis)
    })
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.contains(NAMESPACE_SEPARATOR) {
        return Err(StorageError::InvalidNamespace {
            namespace: namespace.to_string(),
            reason: format!("must not contain '{NAMESPACE_SEPARATOR}'"),
        }
        .into());
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "must not be empty".to_string(),
        }
        .into());
    }
    Ok(())
}
