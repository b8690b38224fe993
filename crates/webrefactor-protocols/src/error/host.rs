//! Tab host errors.

use thiserror::Error;

use crate::host::TabId;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    /// The host will not run scripts in this page.
    #[error("Cannot access contents of url {url}: {reason}")]
    InjectionRefused { url: String, reason: String },

    #[error("Failed to load page: {0}")]
    Load(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injection_refused_display() {
        let err = HostError::InjectionRefused {
            url: "chrome://settings".to_string(),
            reason: "privileged page".to_string(),
        };
        assert!(err.to_string().contains("Cannot access contents of url"));
        assert!(err.to_string().contains("chrome://settings"));
    }
}
