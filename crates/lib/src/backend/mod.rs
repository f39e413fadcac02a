//! Record store implementations for Coffer
//!
//! This module provides the `RecordStore` trait and its implementations.
//!
//! The `RecordStore` trait is the narrow persistence contract the secure
//! storage engine depends on: a string-keyed map of string values with prefix
//! enumeration. It knows nothing about envelopes, namespaces, or encryption,
//! which keeps the engine independent of the specific storage mechanism.

use std::any::Any;

use async_trait::async_trait;

use crate::Result;

mod errors;
mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sql;

pub use errors::BackendError;
pub use in_memory::InMemory;
#[cfg(feature = "sqlite")]
pub use sql::Sqlite;

/// Persistent string-keyed key-value store supplied by the host environment.
///
/// Keys passed here are *physical* keys: the namespace has already been
/// applied. Writes are last-write-wins and there is no multi-key atomicity.
///
/// All implementations must be `Send` and `Sync` so a single store can be
/// shared by every handle of the storage engine, and implement `Any` to allow
/// for downcasting (e.g. to persist an [`InMemory`] store on shutdown).
#[async_trait]
pub trait RecordStore: Send + Sync + Any {
    /// Read the raw value at `key`, or `None` if nothing is stored there.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Delete the value at `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List every stored key that starts with `prefix`, in ascending order.
    ///
    /// An empty prefix lists every key.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Returns a reference to the store as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<RecordStore>")
    }
}
