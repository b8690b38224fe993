//! User-facing pipeline errors.

use std::fmt;

use thiserror::Error;

use super::{ProviderError, StorageError};
use crate::host::TabId;
use crate::retry::RollbackOutcome;

/// Distinct, user-distinguishable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefactorErrorKind {
    UnsupportedPage,
    AgentUnavailable,
    LLMConfigMissing,
    LLMTransportFailure,
    LLMParseFailure,
    NoValidCommands,
    WhitePageDetected,
    NoOriginalState,
    StorageFailure,
    NoDomainMemory,
    NoRecentRefactor,
    TabClosed,
}

impl fmt::Display for RefactorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum RefactorError {
    #[error("Page scheme '{scheme}' does not allow refactoring: {url}")]
    UnsupportedPage { url: String, scheme: String },

    #[error("Page agent unavailable at {url}: {reason}")]
    AgentUnavailable { url: String, reason: String },

    #[error("LLM configuration incomplete. Missing fields: {}", .missing.join(", "))]
    LLMConfigMissing { missing: Vec<String> },

    #[error("LLM request via '{provider}' failed: {source}")]
    LLMTransportFailure {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("Could not recover a command batch from the LLM reply: {reason}")]
    LLMParseFailure { reason: String },

    #[error("All {rejected} proposed commands were rejected")]
    NoValidCommands { rejected: usize },

    #[error("White page detected at {url} after {attempts} attempt(s); {rollback}")]
    WhitePageDetected {
        url: String,
        attempts: u32,
        rollback: RollbackOutcome,
    },

    #[error("No original state recorded for {0}")]
    NoOriginalState(TabId),

    #[error("Storage failure on '{key}': {source}")]
    StorageFailure {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("No memory found for domain {0}")]
    NoDomainMemory(String),

    #[error("No successful refactor in {0} within the save window")]
    NoRecentRefactor(TabId),

    #[error("{0} was closed while the request was in flight")]
    TabClosed(TabId),
}

impl RefactorError {
    pub fn kind(&self) -> RefactorErrorKind {
        match self {
            Self::UnsupportedPage { .. } => RefactorErrorKind::UnsupportedPage,
            Self::AgentUnavailable { .. } => RefactorErrorKind::AgentUnavailable,
            Self::LLMConfigMissing { .. } => RefactorErrorKind::LLMConfigMissing,
            Self::LLMTransportFailure { .. } => RefactorErrorKind::LLMTransportFailure,
            Self::LLMParseFailure { .. } => RefactorErrorKind::LLMParseFailure,
            Self::NoValidCommands { .. } => RefactorErrorKind::NoValidCommands,
            Self::WhitePageDetected { .. } => RefactorErrorKind::WhitePageDetected,
            Self::NoOriginalState(_) => RefactorErrorKind::NoOriginalState,
            Self::StorageFailure { .. } => RefactorErrorKind::StorageFailure,
            Self::NoDomainMemory(_) => RefactorErrorKind::NoDomainMemory,
            Self::NoRecentRefactor(_) => RefactorErrorKind::NoRecentRefactor,
            Self::TabClosed(_) => RefactorErrorKind::TabClosed,
        }
    }

    pub fn storage(key: impl Into<String>, source: StorageError) -> Self {
        Self::StorageFailure {
            key: key.into(),
            source,
        }
    }

    /// At most one suggested remediation.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedPage { .. } => {
                Some("Open a regular http(s) page or a local file and try again.")
            }
            Self::AgentUnavailable { .. } => Some("Reload the page and try again."),
            Self::LLMConfigMissing { .. } => Some("Fill in the API key and API URL in settings."),
            Self::LLMTransportFailure { .. } => {
                Some("Check the API URL, key and network connection, then use Test Connection.")
            }
            Self::LLMParseFailure { .. } => Some("Try again or rephrase the request."),
            Self::NoValidCommands { .. } => {
                Some("Describe the elements to change more specifically.")
            }
            Self::WhitePageDetected {
                rollback: RollbackOutcome::RollbackFailed,
                ..
            } => Some("Reload the page to recover its content."),
            Self::WhitePageDetected { .. } => Some("Try a more specific request."),
            Self::NoOriginalState(_) => Some("Reload the page to restore it."),
            Self::StorageFailure { .. } => None,
            Self::NoDomainMemory(_) => Some("Run a refactor and save it for this site first."),
            Self::NoRecentRefactor(_) => {
                Some("Run the refactor again, then save within 60 seconds.")
            }
            Self::TabClosed(_) => None,
        }
    }

    /// The single human-readable line shown to the user.
    pub fn user_message(&self) -> String {
        match self.remediation() {
            Some(hint) => format!("{}: {} {}", self.kind(), self, hint),
            None => format!("{}: {}", self.kind(), self),
        }
    }
}

#[cfg(test)]
#[path = "refactor_tests.rs"]
mod tests;
