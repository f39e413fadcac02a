//!
//! Coffer: encrypted-at-rest key-value storage for application state.
//!
//! ## Core Concepts
//!
//! * **Record stores (`backend::RecordStore`)**: A pluggable, string-keyed persistence layer.
//!   [`backend::InMemory`] and, with the `sqlite` feature, [`backend::Sqlite`] are provided.
//! * **Session keys (`crypto::KeyManager`)**: One random AES-256 key per session, held only in memory.
//! * **Secure storage (`storage::SecureStorage`)**: `get`/`set`/`remove` over a record store with
//!   optional AES-256-GCM encryption, namespaces, and per-entry expiration.
//! * **Migration (`migration::Migrator`)**: Verified conversion of plaintext records into
//!   encrypted records, with rollback and whole-namespace backup/restore.
//! * **Auto-migration (`auto_migrate::AutoMigration`)**: Converts a configured key the first
//!   time it is read.

pub mod auto_migrate;
pub mod backend;
pub mod clock;
pub mod codec;
pub mod crypto;
pub mod migration;
pub mod storage;

pub use auto_migrate::AutoMigration;
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use migration::Migrator;
pub use storage::{SecureStorage, StorageOptions};

/// Result type used throughout the Coffer library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Coffer library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured record store errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured encoding errors from the codec module
    #[error(transparent)]
    Codec(codec::CodecError),

    /// Structured cryptographic errors from the crypto module
    #[error(transparent)]
    Crypto(crypto::CryptoError),

    /// Structured secure storage errors from the storage module
    #[error(transparent)]
    Storage(storage::StorageError),

    /// Structured migration errors from the migration module
    #[error(transparent)]
    Migration(migration::MigrationError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Backend(_) => "backend",
            Error::Codec(_) => "codec",
            Error::Crypto(_) => "crypto",
            Error::Storage(_) => "storage",
            Error::Migration(_) => "migration",
        }
    }

    /// Check if this error means no session key could be obtained.
    pub fn is_key_unavailable(&self) -> bool {
        match self {
            Error::Crypto(crypto_err) => crypto_err.is_key_unavailable(),
            _ => false,
        }
    }

    /// Check if this error means stored data could not be trusted or read.
    ///
    /// Covers failed tag verification, other cipher faults, and malformed envelopes.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::Crypto(crypto_err) => crypto_err.is_unreadable(),
            Error::Codec(codec_err) => codec_err.is_malformed(),
            _ => false,
        }
    }

    /// Check if this error is a failed tag verification.
    pub fn is_authentication_error(&self) -> bool {
        match self {
            Error::Crypto(crypto_err) => crypto_err.is_authentication_error(),
            _ => false,
        }
    }

    /// Check if this error is a malformed stored payload.
    pub fn is_malformed(&self) -> bool {
        match self {
            Error::Codec(codec_err) => codec_err.is_malformed(),
            _ => false,
        }
    }

    /// Check if this error is a failed post-migration verification.
    pub fn is_verification_error(&self) -> bool {
        match self {
            Error::Migration(migration_err) => migration_err.is_verification_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
            _ => false,
        }
    }

    /// Check if this error came from the record store.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Check if this error is caller input validation.
    pub fn is_validation_error(&self) -> bool {
        match self {
            Error::Storage(storage_err) => storage_err.is_validation_error(),
            _ => false,
        }
    }
}
