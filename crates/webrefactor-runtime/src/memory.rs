//! Per-domain memory in the local namespace.
//!
//! Two records per hostname:
//! - `domain_config_<host>`: the replayable entry, overwritten on save
//! - `memory_<host>`: a capped history of saves, pruned by count and age
//!
//! The two loaders stay separate: one returns a single entry, the other
//! the history list.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use webrefactor_config::Settings;
use webrefactor_protocols::memory::{domain_config_key, history_key};
use webrefactor_protocols::{
    DomainMemoryEntry, HistoryEntry, KeyValueStore, StorageArea, StorageError,
};

const DOMAIN_CONFIG_PREFIX: &str = "domain_config_";

/// Hostname used for memory keys. Local files share one hostname.
pub fn memory_hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() == "file" {
        return Some("file".to_string());
    }
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_ascii_lowercase)
}

/// How much history to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_entries: usize,
    pub max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(max_entries: usize, retention_days: u32) -> Self {
        Self {
            max_entries,
            max_age: Duration::days(i64::from(retention_days)),
        }
    }

    /// Drop entries older than the window, then keep the newest
    /// `max_entries` in their original order. A window reaching past the
    /// earliest representable date keeps every entry.
    pub fn prune(&self, entries: &mut Vec<HistoryEntry>) {
        if let Some(cutoff) = Utc::now().checked_sub_signed(self.max_age) {
            entries.retain(|e| e.timestamp > cutoff);
        }
        if entries.len() > self.max_entries {
            entries.drain(..entries.len() - self.max_entries);
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for RetentionPolicy {
    fn from(settings: &Settings) -> Self {
        Self::new(settings.max_memory_entries, settings.memory_retention_days)
    }
}

#[derive(Clone)]
pub struct DomainMemoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl DomainMemoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The replayable entry for a hostname.
    pub async fn load_domain_config(
        &self,
        hostname: &str,
    ) -> Result<Option<DomainMemoryEntry>, StorageError> {
        let key = domain_config_key(hostname);
        match self.store.get(StorageArea::Local, &key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Replace the entry for `entry.domain`.
    pub async fn save_domain_config(&self, entry: &DomainMemoryEntry) -> Result<(), StorageError> {
        let key = domain_config_key(&entry.domain);
        self.store
            .set(StorageArea::Local, &key, serde_json::to_value(entry)?)
            .await?;
        info!(
            domain = %entry.domain,
            commands = entry.commands.len(),
            "Saved domain memory"
        );
        Ok(())
    }

    /// History for a hostname, oldest first. Unreadable lists are treated
    /// as empty.
    pub async fn load_domain_memory_history(
        &self,
        hostname: &str,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let key = history_key(hostname);
        match self.store.get(StorageArea::Local, &key).await? {
            Some(value @ Value::Array(_)) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(hostname, error = %e, "Discarding unreadable memory history");
                Vec::new()
            })),
            _ => Ok(Vec::new()),
        }
    }

    /// Append to the history and prune it. Returns the stored list.
    pub async fn append_history(
        &self,
        hostname: &str,
        entry: HistoryEntry,
        policy: RetentionPolicy,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut history = self.load_domain_memory_history(hostname).await?;
        history.push(entry);
        policy.prune(&mut history);
        self.store
            .set(
                StorageArea::Local,
                &history_key(hostname),
                serde_json::to_value(&history)?,
            )
            .await?;
        debug!(hostname, kept = history.len(), "Updated memory history");
        Ok(history)
    }

    /// Remove both records for a hostname. Returns whether an entry existed.
    pub async fn forget_domain(&self, hostname: &str) -> Result<bool, StorageError> {
        let existed = self.load_domain_config(hostname).await?.is_some();
        self.store
            .remove(StorageArea::Local, &domain_config_key(hostname))
            .await?;
        self.store
            .remove(StorageArea::Local, &history_key(hostname))
            .await?;
        info!(hostname, existed, "Forgot domain memory");
        Ok(existed)
    }

    /// Hostnames that have a replayable entry.
    pub async fn domains(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .store
            .keys(StorageArea::Local, DOMAIN_CONFIG_PREFIX)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(DOMAIN_CONFIG_PREFIX).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
