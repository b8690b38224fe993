//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use webrefactor_protocols::DetectorThresholds;

mod pipeline;
mod settings;

pub use pipeline::*;
pub use settings::*;

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// User settings; seeds the synchronized storage namespace.
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub detector: DetectorThresholds,

    #[serde(default)]
    pub protection: ProtectionConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Elements the executor refuses to hide or remove, beyond the structural tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Case-insensitive substrings of `id` or `class`.
    #[serde(default)]
    pub protected_substrings: Vec<String>,
}

/// Where persistent data lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Data directory with `~` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        PathBuf::from(crate::ConfigLoader::expand_path(&self.data_dir))
    }
}

fn default_data_dir() -> String {
    dirs::home_dir()
        .map(|h| h.join(".webrefactor").display().to_string())
        .unwrap_or_else(|| ".webrefactor".to_string())
}
