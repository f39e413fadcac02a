//! Value codec.
//!
//! Application values are stored as JSON text. Anything `serde` can express
//! as JSON (objects, arrays, numbers, strings, booleans, null) round-trips
//! losslessly through [`encode`] and [`decode`].

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::Result;

/// Errors produced while encoding or decoding stored values.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be represented as JSON.
    #[error("Failed to encode value: {reason}")]
    Unencodable { reason: String },

    /// Stored text did not decode to the requested shape.
    #[error("Malformed payload: {reason}")]
    Malformed { reason: String },
}

impl CodecError {
    /// Check if this error describes unreadable stored data.
    pub fn is_malformed(&self) -> bool {
        matches!(self, CodecError::Malformed { .. })
    }
}

impl From<CodecError> for crate::Error {
    fn from(err: CodecError) -> Self {
        crate::Error::Codec(err)
    }
}

/// Encode a value to its stored text form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        CodecError::Unencodable {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Decode stored text back into a value.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        CodecError::Malformed {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Convert a decoded JSON value into a caller type.
///
/// Used on read paths that first decode to [`serde_json::Value`] for
/// comparison and then hand the caller a typed value.
pub fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        CodecError::Malformed {
            reason: e.to_string(),
        }
        .into()
    })
}
