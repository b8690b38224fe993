//! JSON file store.
//!
//! Each namespace is one JSON object on disk (`sync.json`, `local.json`).
//! Reads are served from a cache loaded at open; every write rewrites the
//! namespace file through a temporary file and a rename.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use webrefactor_protocols::error::StorageError;
use webrefactor_protocols::storage::{KeyValueStore, StorageArea};

const AREAS: [StorageArea; 2] = [StorageArea::Sync, StorageArea::Local];

/// File-backed store.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    cache: RwLock<HashMap<StorageArea, BTreeMap<String, Value>>>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::Io(format!("create {}: {e}", dir.display())))?;
            info!("Created storage directory: {:?}", dir);
        }

        let mut cache = HashMap::new();
        for area in AREAS {
            cache.insert(area, load_area(&area_path(&dir, area)).await?);
        }
        debug!(
            dir = %dir.display(),
            sync = cache[&StorageArea::Sync].len(),
            local = cache[&StorageArea::Local].len(),
            "Opened JSON store"
        );

        Ok(Self {
            dir,
            cache: RwLock::new(cache),
        })
    }

    /// Store under `~/.webrefactor/storage`.
    pub async fn default_path() -> Result<Self, StorageError> {
        let home = dirs::home_dir()
            .ok_or_else(|| StorageError::Backend("home directory not found".to_string()))?;
        Self::open(home.join(".webrefactor").join("storage")).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn persist(&self, area: StorageArea, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let path = area_path(&self.dir, area);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(entries)?;
        fs::write(&tmp, body)
            .await
            .map_err(|e| StorageError::Io(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::Io(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }
}

fn area_path(dir: &Path, area: StorageArea) -> PathBuf {
    dir.join(format!("{}.json", area.as_str()))
}

async fn load_area(path: &Path) -> Result<BTreeMap<String, Value>, StorageError> {
    match fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(StorageError::Io(format!("read {}: {e}", path.display()))),
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, area: StorageArea, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .cache
            .read()
            .await
            .get(&area)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), StorageError> {
        let mut cache = self.cache.write().await;
        let entries = cache.entry(area).or_default();
        entries.insert(key.to_string(), value);
        self.persist(area, entries).await?;
        debug!(area = area.as_str(), key, "Stored key");
        Ok(())
    }

    async fn remove(&self, area: StorageArea, key: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.write().await;
        let entries = cache.entry(area).or_default();
        if entries.remove(key).is_some() {
            self.persist(area, entries).await?;
            debug!(area = area.as_str(), key, "Removed key");
        }
        Ok(())
    }

    async fn keys(&self, area: StorageArea, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .cache
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store
                .set(StorageArea::Local, "domain_news.example.com", json!({"prompt": "hide ads"}))
                .await
                .unwrap();
            store.set(StorageArea::Sync, "enableAutoRefactor", json!(true)).await.unwrap();
        }

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            store.get(StorageArea::Local, "domain_news.example.com").await.unwrap(),
            Some(json!({"prompt": "hide ads"}))
        );
        assert_eq!(
            store.get(StorageArea::Sync, "enableAutoRefactor").await.unwrap(),
            Some(json!(true))
        );
        assert!(dir.path().join("local.json").exists());
        assert!(!dir.path().join("local.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = JsonFileStore::open(&nested).await.unwrap();
        assert_eq!(store.dir(), nested.as_path());
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.set(StorageArea::Local, "a", json!(1)).await.unwrap();
        store.remove(StorageArea::Local, "a").await.unwrap();
        store.remove(StorageArea::Local, "missing").await.unwrap();
        drop(store);

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.keys(StorageArea::Local, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sync.json"), "{not json").unwrap();
        let err = JsonFileStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_area() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("local.json"), "\n").unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.keys(StorageArea::Local, "").await.unwrap().is_empty());
    }
}
