//! Storage configuration.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::codec::CodecError;

/// Settings for a [`SecureStorage`](super::SecureStorage).
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```
/// use coffer::storage::StorageConfig;
///
/// let config = StorageConfig::from_json(r#"{"auto_migrate_keys": ["session_token"]}"#).unwrap();
/// assert_eq!(config.default_namespace, "");
/// assert_eq!(config.auto_migrate_keys, vec!["session_token"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Namespace used when [`StorageOptions`](super::StorageOptions) names none.
    /// Empty means global.
    pub default_namespace: String,
    /// Logical keys that should be stored encrypted and migrated on first read.
    pub auto_migrate_keys: Vec<String>,
}

impl StorageConfig {
    /// Parse a config from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            CodecError::Malformed {
                reason: format!("Invalid storage config: {e}"),
            }
            .into()
        })
    }
}
