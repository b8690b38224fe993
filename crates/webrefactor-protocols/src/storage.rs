//! Key/value storage protocol.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// Storage namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Cross-device: user settings and the auto-refactor toggle.
    Sync,
    /// Per-device: domain memory, history, exchange logs.
    Local,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Local => "local",
        }
    }
}

/// A two-namespace JSON key/value store. Writers are last-writer-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key. `Ok(None)` when absent.
    async fn get(&self, area: StorageArea, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write a key, replacing any previous value.
    async fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn remove(&self, area: StorageArea, key: &str) -> Result<(), StorageError>;

    /// List keys in an area starting with `prefix`.
    async fn keys(&self, area: StorageArea, prefix: &str) -> Result<Vec<String>, StorageError>;
}
