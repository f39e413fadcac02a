//! Persistence operations for the InMemory store
//!
//! Handles serialization and file I/O for saving/loading the in-memory
//! records to/from JSON files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::InMemory;
use crate::{Error, Result, backend::errors::BackendError};

/// The current persistence file format version.
/// v0 indicates this is an unstable format subject to breaking changes.
const PERSISTENCE_VERSION: u8 = 0;

/// Helper to check if version is default (0) for serde skip_serializing_if
fn is_v0(v: &u8) -> bool {
    *v == 0
}

/// Serializable form of the InMemory store
#[derive(Serialize, Deserialize)]
struct SerializableStore {
    /// File format version for compatibility checking
    #[serde(rename = "_v", default, skip_serializing_if = "is_v0")]
    version: u8,
    records: BTreeMap<String, String>,
}

/// Saves every record to a specified file as JSON.
pub(crate) async fn save_to_file<P: AsRef<Path>>(store: &InMemory, path: P) -> Result<()> {
    let serializable = SerializableStore {
        version: PERSISTENCE_VERSION,
        records: store.snapshot().await,
    };

    let json = serde_json::to_string_pretty(&serializable)
        .map_err(|e| -> Error { BackendError::SerializationFailed { source: e }.into() })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| -> Error { BackendError::FileIo { source: e }.into() })
}

/// Loads records from a specified JSON file.
///
/// If the file does not exist, a new, empty `InMemory` store is returned.
pub(crate) async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<InMemory> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => {
            let serializable: SerializableStore = serde_json::from_str(&json).map_err(|e| -> Error {
                BackendError::DeserializationFailed { source: e }.into()
            })?;
            if serializable.version != PERSISTENCE_VERSION {
                return Err(BackendError::UnsupportedVersion {
                    found: serializable.version,
                    expected: PERSISTENCE_VERSION,
                }
                .into());
            }
            Ok(InMemory::from_records(serializable.records))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(InMemory::new()),
        Err(e) => Err(BackendError::FileIo { source: e }.into()),
    }
}
