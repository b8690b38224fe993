//! Damage reporting and retry feedback.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::MutationCommand;
use crate::page::PageFingerprint;

/// One white-page rule that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSignal {
    BodyMissing,
    TextCollapsed,
    HeightCollapsed,
    SignificantCollapsed,
    AbsoluteEmpty,
    TextDropWarning,
    VisibleDropWarning,
    ContainersLostWarning,
}

impl DamageSignal {
    pub fn is_critical(&self) -> bool {
        !matches!(
            self,
            Self::TextDropWarning | Self::VisibleDropWarning | Self::ContainersLostWarning
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::BodyMissing => "body element disappeared",
            Self::TextCollapsed => "body text collapsed",
            Self::HeightCollapsed => "body height collapsed",
            Self::SignificantCollapsed => "content-bearing elements collapsed",
            Self::AbsoluteEmpty => "page is effectively empty",
            Self::TextDropWarning => "large text loss",
            Self::VisibleDropWarning => "large loss of visible elements",
            Self::ContainersLostWarning => "all content containers lost",
        }
    }
}

impl fmt::Display for DamageSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Result of restoring a damaged page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackOutcome {
    RolledBack,
    RollbackFailed,
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RolledBack => f.write_str("rolled_back"),
            Self::RollbackFailed => f.write_str("rollback_failed"),
        }
    }
}

/// What the Page Agent reports when a batch collapses the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageSignature {
    pub before: PageFingerprint,
    pub after: PageFingerprint,
    /// The full batch that was being executed.
    pub batch: Vec<MutationCommand>,
    /// Selectors the agent's safety gate refused during this request.
    #[serde(default)]
    pub blocked_selectors: Vec<String>,
    #[serde(default)]
    pub signals: Vec<DamageSignal>,
    /// Outcome of the agent's local rollback.
    pub rollback: RollbackOutcome,
}

/// Feedback handed to the LLM Client for the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryContext {
    pub failed_commands: Vec<MutationCommand>,
    pub before: PageFingerprint,
    pub after: PageFingerprint,
    pub blocked_selectors: Vec<String>,
    pub failure_reason: String,
    /// 1-based number of the attempt that failed.
    pub attempt: u32,
}

impl RetryContext {
    /// Build from a damage signature plus selectors the parser rejected.
    pub fn from_damage(damage: &DamageSignature, parser_blocked: &[String], attempt: u32) -> Self {
        let mut blocked_selectors = parser_blocked.to_vec();
        for selector in &damage.blocked_selectors {
            if !blocked_selectors.contains(selector) {
                blocked_selectors.push(selector.clone());
            }
        }
        let failure_reason = if damage.signals.is_empty() {
            "White page detected after executing commands".to_string()
        } else {
            let signals: Vec<&str> = damage.signals.iter().map(DamageSignal::describe).collect();
            format!("White page detected: {}", signals.join(", "))
        };
        Self {
            failed_commands: damage.batch.clone(),
            before: damage.before.clone(),
            after: damage.after.clone(),
            blocked_selectors,
            failure_reason,
            attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn damage() -> DamageSignature {
        DamageSignature {
            before: PageFingerprint::default(),
            after: PageFingerprint::default(),
            batch: vec![MutationCommand::hide("div")],
            blocked_selectors: vec!["body > *".into()],
            signals: vec![DamageSignal::TextCollapsed, DamageSignal::AbsoluteEmpty],
            rollback: RollbackOutcome::RolledBack,
        }
    }

    #[test]
    fn test_retry_context_merges_blocked_selectors() {
        let ctx = RetryContext::from_damage(&damage(), &["*".into(), "body > *".into()], 1);
        assert_eq!(ctx.blocked_selectors, vec!["*".to_string(), "body > *".to_string()]);
        assert_eq!(ctx.failed_commands.len(), 1);
        assert_eq!(ctx.attempt, 1);
    }

    #[test]
    fn test_retry_context_reason_lists_signals() {
        let ctx = RetryContext::from_damage(&damage(), &[], 1);
        assert!(ctx.failure_reason.contains("body text collapsed"));
        assert!(ctx.failure_reason.contains("effectively empty"));
    }

    #[test]
    fn test_signal_criticality() {
        assert!(DamageSignal::HeightCollapsed.is_critical());
        assert!(!DamageSignal::VisibleDropWarning.is_critical());
    }

    #[test]
    fn test_rollback_outcome_wire() {
        let v = serde_json::to_value(RollbackOutcome::RollbackFailed).unwrap();
        assert_eq!(v, "rollback_failed");
        assert_eq!(RollbackOutcome::RolledBack.to_string(), "rolled_back");
    }
}
