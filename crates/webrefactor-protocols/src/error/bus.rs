//! Message bus errors.

use thiserror::Error;

use crate::host::TabId;

#[derive(Debug, Error)]
pub enum BusError {
    /// Nobody is listening in the tab; the agent should be injected.
    #[error("No agent listening in {0}")]
    NoListener(TabId),

    /// The agent accepted the request but did not answer in time.
    #[error("Request '{action}' to {tab} timed out after {millis}ms")]
    Timeout {
        tab: TabId,
        action: &'static str,
        millis: u64,
    },

    /// The agent went away before answering.
    #[error("Agent in {0} closed the channel before replying")]
    Closed(TabId),
}

impl BusError {
    pub fn is_no_listener(&self) -> bool {
        matches!(self, Self::NoListener(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = BusError::Timeout {
            tab: TabId(3),
            action: "ping",
            millis: 1000,
        };
        let s = err.to_string();
        assert!(s.contains("tab-3"));
        assert!(s.contains("ping"));
        assert!(s.contains("1000ms"));
    }

    #[test]
    fn test_no_listener_is_distinct() {
        assert!(BusError::NoListener(TabId(1)).is_no_listener());
        assert!(!BusError::Closed(TabId(1)).is_no_listener());
    }
}
