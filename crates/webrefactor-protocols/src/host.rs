//! Tab host protocol.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Identity of a browser tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

/// The environment that owns tabs and can inject a Page Agent into them.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Current URL of a tab.
    async fn tab_url(&self, tab: TabId) -> Result<String, HostError>;

    /// Inject the agent. Privileged pages refuse with
    /// [`HostError::InjectionRefused`].
    async fn inject_agent(&self, tab: TabId) -> Result<(), HostError>;
}
