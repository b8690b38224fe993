//! Per-domain transformation memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::MutationCommand;

/// Storage key of the current entry for a hostname.
pub fn domain_config_key(hostname: &str) -> String {
    format!("domain_config_{}", hostname.to_ascii_lowercase())
}

/// Storage key of the capped history list for a hostname.
pub fn history_key(hostname: &str) -> String {
    format!("memory_{}", hostname.to_ascii_lowercase())
}

/// Schema version of a stored entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryVersion {
    /// Prompt only.
    #[default]
    #[serde(rename = "1.0")]
    V1,
    /// Prompt plus the commands it produced.
    #[serde(rename = "2.0")]
    V2,
}

/// The replayable memory for one hostname. Writing replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMemoryEntry {
    pub domain: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<MutationCommand>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub version: MemoryVersion,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl DomainMemoryEntry {
    /// A prompt-only entry.
    pub fn prompt_only(
        domain: impl Into<String>,
        prompt: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            prompt: prompt.into(),
            commands: Vec::new(),
            url: url.into(),
            version: MemoryVersion::V1,
            timestamp: Utc::now(),
        }
    }

    /// An entry holding commands.
    pub fn with_commands(
        domain: impl Into<String>,
        prompt: impl Into<String>,
        url: impl Into<String>,
        commands: Vec<MutationCommand>,
    ) -> Self {
        Self {
            domain: domain.into(),
            prompt: prompt.into(),
            commands,
            url: url.into(),
            version: MemoryVersion::V2,
            timestamp: Utc::now(),
        }
    }

    /// Whether replay can skip the LLM.
    pub fn has_commands(&self) -> bool {
        self.version == MemoryVersion::V2 && !self.commands.is_empty()
    }

    /// Upgrade in place to a command-bearing entry with a fresh timestamp.
    pub fn upgrade(&mut self, commands: Vec<MutationCommand>, url: impl Into<String>) {
        self.commands = commands;
        self.url = url.into();
        self.version = MemoryVersion::V2;
        self.timestamp = Utc::now();
    }
}

/// One element of the per-hostname history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub prompt: String,
    #[serde(default)]
    pub commands: Vec<MutationCommand>,
    #[serde(default)]
    pub url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl From<&DomainMemoryEntry> for HistoryEntry {
    fn from(entry: &DomainMemoryEntry) -> Self {
        Self {
            prompt: entry.prompt.clone(),
            commands: entry.commands.clone(),
            url: entry.url.clone(),
            timestamp: entry.timestamp,
        }
    }
}
