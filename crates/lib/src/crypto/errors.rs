//! Error types for record encryption.

use thiserror::Error;

/// Errors raised while sealing or opening records.
///
/// `Authentication` and `Decryption` are never retryable with the same key.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No session key could be obtained.
    #[error("Encryption key unavailable")]
    KeyUnavailable,

    /// The ciphertext or tag failed integrity verification.
    #[error("Ciphertext failed authentication")]
    Authentication,

    /// Any cipher-level failure other than a tag mismatch.
    #[error("Decryption failed: {reason}")]
    Decryption { reason: String },

    /// Sealing a plaintext failed.
    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },
}

impl CryptoError {
    /// Check if this error means no key is available.
    pub fn is_key_unavailable(&self) -> bool {
        matches!(self, CryptoError::KeyUnavailable)
    }

    /// Check if this error is a tag verification failure.
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, CryptoError::Authentication)
    }

    /// Check if this error means a stored ciphertext can not be read back.
    pub fn is_unreadable(&self) -> bool {
        matches!(
            self,
            CryptoError::Authentication | CryptoError::Decryption { .. }
        )
    }
}

impl From<CryptoError> for crate::Error {
    fn from(err: CryptoError) -> Self {
        crate::Error::Crypto(err)
    }
}
