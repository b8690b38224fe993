//! Messages exchanged between the Controller and a Page Agent.
//!
//! Every request gets exactly one [`AgentResponse`], shaped
//! `{success, data?, error?}`. The agent never lets a failure escape any
//! other way.

use serde::{Deserialize, Serialize};

use crate::command::MutationCommand;
use crate::page::{OriginalStateSnapshot, PageFingerprint, PageSummary};
use crate::retry::DamageSignature;

/// Requests understood by the Page Agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AgentRequest {
    /// Liveness probe.
    Ping,
    /// Return a page summary and an original-state snapshot.
    ExtractContent,
    /// Execute a batch under white-page supervision.
    ExecuteCommands { commands: Vec<MutationCommand> },
    /// Restore the page. Uses the given snapshot, else the agent's own copy.
    Reset {
        #[serde(default, rename = "originalState", skip_serializing_if = "Option::is_none")]
        original_state: Option<OriginalStateSnapshot>,
    },
    /// Return the agent's diagnostic state.
    GetDebugLogs,
    /// Attach overlay annotations.
    ApplyEnhancements { enhancements: Vec<Enhancement> },
    /// Remove all overlay annotations.
    ClearEnhancements,
}

impl AgentRequest {
    /// Wire name of the request.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::ExtractContent => "extractContent",
            Self::ExecuteCommands { .. } => "executeCommands",
            Self::Reset { .. } => "reset",
            Self::GetDebugLogs => "getDebugLogs",
            Self::ApplyEnhancements { .. } => "applyEnhancements",
            Self::ClearEnhancements => "clearEnhancements",
        }
    }
}

/// An overlay annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Enhancement {
    DrawBox {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    AddText { selector: String, text: String },
}

impl Enhancement {
    pub fn selector(&self) -> &str {
        match self {
            Self::DrawBox { selector, .. } | Self::AddText { selector, .. } => selector,
        }
    }
}

/// Successful payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AgentReply {
    Pong,
    Extracted {
        summary: PageSummary,
        snapshot: OriginalStateSnapshot,
    },
    Executed(ExecutionReport),
    Restored {
        /// True when the agent's retained snapshot was used.
        used_fallback: bool,
    },
    DebugLogs(DebugLogs),
    Enhancements { active: usize },
}

/// Per-command result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub index: usize,
    pub command_type: String,
    pub selector: String,
    /// Elements the selector matched.
    pub matched: usize,
    /// Elements actually mutated.
    pub applied: usize,
    /// Elements skipped because they are protected.
    pub skipped_protected: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of one `executeCommands` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub outcomes: Vec<CommandOutcome>,
    pub skipped_protected: usize,
    pub blocked_selectors: Vec<String>,
    pub before: PageFingerprint,
    pub after: PageFingerprint,
    pub sub_batches: usize,
    /// Fingerprints taken after the before-sample, final sample included.
    pub samples: usize,
}

impl ExecutionReport {
    pub fn failed(&self) -> impl Iterator<Item = &CommandOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// Diagnostic state exposed by `getDebugLogs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugLogs {
    pub has_snapshot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_before: Option<PageFingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_after: Option<PageFingerprint>,
    #[serde(default)]
    pub last_batch: Vec<MutationCommand>,
    #[serde(default)]
    pub failed_commands: Vec<CommandOutcome>,
    #[serde(default)]
    pub blocked_selectors: Vec<String>,
    pub skipped_protected: usize,
    /// Most recent agent events, oldest first.
    #[serde(default)]
    pub events: Vec<String>,
}

/// Failure payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub message: String,
    /// Present when the failure is a detected white page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<DamageSignature>,
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AgentReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AgentFailure>,
}

impl AgentResponse {
    pub fn ok(reply: AgentReply) -> Self {
        Self {
            success: true,
            data: Some(reply),
            error: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(AgentFailure {
                message: message.into(),
                damage: None,
            }),
        }
    }

    pub fn white_page(message: impl Into<String>, damage: DamageSignature) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(AgentFailure {
                message: message.into(),
                damage: Some(damage),
            }),
        }
    }

    /// Collapse the envelope into a `Result`.
    pub fn into_result(self) -> Result<AgentReply, AgentFailure> {
        match (self.success, self.data, self.error) {
            (true, Some(reply), _) => Ok(reply),
            (_, _, Some(err)) => Err(err),
            (true, None, None) => Err(AgentFailure {
                message: "Agent reported success without data".to_string(),
                damage: None,
            }),
            (false, _, None) => Err(AgentFailure {
                message: "Agent reported failure without details".to_string(),
                damage: None,
            }),
        }
    }
}
