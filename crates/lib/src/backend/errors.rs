//! Record store error types.

use thiserror::Error;

/// Errors that can occur inside a record store.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// Serialization of the store's persisted state failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization of the store's persisted state failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A persisted file was written by an unknown format version.
    #[error("Unsupported persistence version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u8,
        /// Version this build understands
        expected: u8,
    },

    /// SQL database operation failed.
    #[cfg(feature = "sqlite")]
    #[error("SQL error: {reason}")]
    SqlxError {
        /// Description including context
        reason: String,
        /// The underlying sqlx error, when there is one
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl BackendError {
    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            BackendError::FileIo { .. }
                | BackendError::SerializationFailed { .. }
                | BackendError::DeserializationFailed { .. }
        )
    }

    /// Check if this error came from the SQL layer.
    pub fn is_sql_error(&self) -> bool {
        #[cfg(feature = "sqlite")]
        if matches!(self, BackendError::SqlxError { .. }) {
            return true;
        }
        false
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
