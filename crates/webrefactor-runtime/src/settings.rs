//! User settings in the synchronized namespace.
//!
//! Each setting is its own key (`apiKey`, `enableAutoRefactor`, ...), so
//! a device that only knows some of them leaves the rest alone. Keys not
//! present in storage fall back to the configured defaults.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use webrefactor_config::Settings;
use webrefactor_protocols::{KeyValueStore, StorageArea, StorageError};

/// Storage keys making up [`Settings`].
pub const SETTING_KEYS: [&str; 10] = [
    "provider",
    "apiUrl",
    "apiKey",
    "modelName",
    "maxTokens",
    "language",
    "enableAutoRefactor",
    "proxyUrl",
    "maxMemoryEntries",
    "memoryRetentionDays",
];

/// Older builds stored the provider under this key.
const LEGACY_PROVIDER_KEY: &str = "llmProvider";

#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    defaults: Settings,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>, defaults: Settings) -> Self {
        Self { store, defaults }
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Current settings. Always read fresh from storage.
    pub async fn load(&self) -> Result<Settings, StorageError> {
        let mut merged = match serde_json::to_value(&self.defaults)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        if let Some(legacy) = self.store.get(StorageArea::Sync, LEGACY_PROVIDER_KEY).await? {
            merged.insert("provider".to_string(), legacy);
        }
        for key in SETTING_KEYS {
            if let Some(value) = self.store.get(StorageArea::Sync, key).await? {
                merged.insert(key.to_string(), value);
            }
        }

        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// Write every setting.
    pub async fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        let Value::Object(map) = serde_json::to_value(settings)? else {
            return Err(StorageError::Serialization("settings are not an object".into()));
        };
        for key in SETTING_KEYS {
            match map.get(key) {
                Some(value) => self.store.set(StorageArea::Sync, key, value.clone()).await?,
                None => self.store.remove(StorageArea::Sync, key).await?,
            }
        }
        self.store.remove(StorageArea::Sync, LEGACY_PROVIDER_KEY).await?;
        debug!(provider = %settings.provider, "Saved settings");
        Ok(())
    }

    /// Write configured defaults for keys storage does not hold yet.
    /// Returns the number of keys written.
    pub async fn seed(&self) -> Result<usize, StorageError> {
        let Value::Object(map) = serde_json::to_value(&self.defaults)? else {
            return Ok(0);
        };
        let mut written = 0;
        for key in SETTING_KEYS {
            let Some(value) = map.get(key) else { continue };
            if key == "provider"
                && self.store.get(StorageArea::Sync, LEGACY_PROVIDER_KEY).await?.is_some()
            {
                continue;
            }
            if self.store.get(StorageArea::Sync, key).await?.is_none() {
                self.store.set(StorageArea::Sync, key, value.clone()).await?;
                written += 1;
            }
        }
        if written > 0 {
            debug!(written, "Seeded settings");
        }
        Ok(written)
    }

    pub async fn auto_refactor_enabled(&self) -> Result<bool, StorageError> {
        Ok(self.load().await?.enable_auto_refactor)
    }

    pub async fn set_auto_refactor(&self, enabled: bool) -> Result<(), StorageError> {
        self.store
            .set(StorageArea::Sync, "enableAutoRefactor", Value::Bool(enabled))
            .await
    }
}
