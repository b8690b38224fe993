//! User settings.
//!
//! Serialized camelCase in storage; snake_case keys are accepted too so
//! the same struct reads from TOML naturally.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named LLM transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Anthropic,
    /// Any OpenAI-compatible endpoint.
    Custom,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Custom => "custom",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI | Self::Custom => "gpt-3.5-turbo",
            Self::Anthropic => "claude-3-haiku-20240307",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Settings as stored in the synchronized namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, alias = "llm_provider", alias = "llmProvider")]
    pub provider: ProviderKind,

    #[serde(default, alias = "api_url")]
    pub api_url: String,

    #[serde(default, alias = "api_key")]
    pub api_key: String,

    #[serde(default, alias = "model_name")]
    pub model_name: String,

    #[serde(default = "default_max_tokens", alias = "max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default, alias = "enable_auto_refactor")]
    pub enable_auto_refactor: bool,

    #[serde(default, alias = "proxy_url", skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(default = "default_max_memory_entries", alias = "max_memory_entries")]
    pub max_memory_entries: usize,

    #[serde(default = "default_retention_days", alias = "memory_retention_days")]
    pub memory_retention_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_url: String::new(),
            api_key: String::new(),
            model_name: String::new(),
            max_tokens: default_max_tokens(),
            language: default_language(),
            enable_auto_refactor: false,
            proxy_url: None,
            max_memory_entries: default_max_memory_entries(),
            memory_retention_days: default_retention_days(),
        }
    }
}

impl Settings {
    /// Human names of the credential fields that are still empty.
    pub fn missing_credentials(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.api_key.trim().is_empty() {
            missing.push("API Key".to_string());
        }
        if self.api_url.trim().is_empty() {
            missing.push("API URL".to_string());
        }
        missing
    }

    /// Configured model, or the provider default.
    pub fn effective_model(&self) -> &str {
        if self.model_name.trim().is_empty() {
            self.provider.default_model()
        } else {
            &self.model_name
        }
    }

    /// Proxy URL when one is set and non-blank.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy_url.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_memory_entries() -> usize {
    5
}

fn default_retention_days() -> u32 {
    30
}
