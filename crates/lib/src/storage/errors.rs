//! Error types for the secure storage engine.

use thiserror::Error;

/// Errors raised by [`SecureStorage`](super::SecureStorage) for invalid
/// caller input.
///
/// Failures of the underlying layers keep their own types
/// ([`CryptoError`](crate::crypto::CryptoError),
/// [`CodecError`](crate::codec::CodecError),
/// [`BackendError`](crate::backend::BackendError)).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// The namespace would alias other namespaces' keys.
    #[error("Invalid namespace '{namespace}': {reason}")]
    InvalidNamespace {
        /// Namespace as supplied by the caller
        namespace: String,
        /// Why it was rejected
        reason: String,
    },

    /// The logical key can not address a record.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey {
        /// Key as supplied by the caller
        key: String,
        /// Why it was rejected
        reason: String,
    },
}

impl StorageError {
    /// Check if this error is caller input validation.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            StorageError::InvalidNamespace { .. } | StorageError::InvalidKey { .. }
        )
    }
}

impl From<StorageError> for crate::Error {
    fn from(err: StorageError) -> Self {
        crate::Error::Storage(err)
    }
}
