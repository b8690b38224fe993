//! Page Agent errors.
//!
//! These never cross the bus as errors: the agent renders them into a
//! `{success: false, error}` response.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("No matching elements found: {0}")]
    NoMatch(String),

    #[error("Target element not found: {0}")]
    TargetNotFound(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Wrapper markup contains no element: {0}")]
    InvalidFragment(String),

    #[error("Cannot move element into itself or its descendant: {0}")]
    CyclicMove(String),

    #[error("No original state available")]
    NoOriginalState,

    #[error("Failed to restore original state: {0}")]
    RestoreFailed(String),
}
