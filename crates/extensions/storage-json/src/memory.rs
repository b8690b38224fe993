//! In-memory store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use webrefactor_protocols::error::StorageError;
use webrefactor_protocols::storage::{KeyValueStore, StorageArea};

/// Store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    areas: RwLock<HashMap<StorageArea, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys in an area.
    pub async fn len(&self, area: StorageArea) -> usize {
        self.areas.read().await.get(&area).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, area: StorageArea, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .areas
            .read()
            .await
            .get(&area)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), StorageError> {
        self.areas
            .write()
            .await
            .entry(area)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, area: StorageArea, key: &str) -> Result<(), StorageError> {
        if let Some(entries) = self.areas.write().await.get_mut(&area) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, area: StorageArea, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .areas
            .read()
            .await
            .get(&area)
            .map(|entries| {
                entries
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
