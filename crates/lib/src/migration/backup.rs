//! Raw namespace snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Copy of every raw record in one namespace at one moment.
///
/// Values are the persisted envelope strings exactly as stored, so restoring
/// a snapshot is byte-for-byte. Snapshots are not atomic with concurrent
/// writers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// Namespace the snapshot covers; empty means the whole store.
    pub namespace: String,
    /// RFC 3339 time the snapshot was taken.
    pub created_at: String,
    /// Physical key to raw stored string.
    pub records: BTreeMap<String, String>,
}

impl BackupSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
