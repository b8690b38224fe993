//! Auxiliary record of model exchanges.
//!
//! Each call appends to `llm_log_<name>` in the local namespace. Failures
//! to write are logged and dropped; the pipeline never fails because of
//! this record.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use webrefactor_protocols::{KeyValueStore, StorageArea, StorageError};

/// Entries kept per log name.
pub const MAX_LOG_ENTRIES: usize = 10;

#[derive(Clone)]
pub struct ExchangeLog {
    store: Arc<dyn KeyValueStore>,
}

impl ExchangeLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn key(name: &str) -> String {
        format!("llm_log_{name}")
    }

    /// Append `data` under `name`, keeping the newest entries.
    pub async fn record(&self, name: &str, data: Value) {
        if let Err(e) = self.append(name, data).await {
            warn!(name, error = %e, "Failed to write LLM exchange log");
        }
    }

    /// Entries under `name`, oldest first.
    pub async fn entries(&self, name: &str) -> Result<Vec<Value>, StorageError> {
        match self.store.get(StorageArea::Local, &Self::key(name)).await? {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    async fn append(&self, name: &str, data: Value) -> Result<(), StorageError> {
        let mut entries = self.entries(name).await?;
        entries.push(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "data": data,
        }));
        if entries.len() > MAX_LOG_ENTRIES {
            entries.drain(..entries.len() - MAX_LOG_ENTRIES);
        }
        self.store
            .set(StorageArea::Local, &Self::key(name), Value::Array(entries))
            .await?;
        debug!(name, "Recorded LLM exchange");
        Ok(())
    }
}
