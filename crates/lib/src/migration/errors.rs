//! Error types for plaintext-to-encrypted migration.

use thiserror::Error;

/// Errors specific to the migration engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The encrypted record read back after a migration did not match the
    /// original value.
    #[error("Migration of '{key}' could not be verified: {reason}")]
    VerificationMismatch {
        /// Physical key being migrated
        key: String,
        /// What the read-back found
        reason: String,
    },
}

impl MigrationError {
    /// Check if this error is a failed post-migration verification.
    pub fn is_verification_error(&self) -> bool {
        matches!(self, MigrationError::VerificationMismatch { .. })
    }
}

impl From<MigrationError> for crate::Error {
    fn from(err: MigrationError) -> Self {
        crate::Error::Migration(err)
    }
}
