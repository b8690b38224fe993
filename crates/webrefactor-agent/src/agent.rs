//! The Page Agent.
//!
//! Owns one tab's document while it lives. Every request gets exactly one
//! [`AgentResponse`]; failures are rendered into the envelope, never
//! propagated.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use webrefactor_bus::Mailbox;
use webrefactor_core::{SafetyGate, WhitePageDetector};
use webrefactor_protocols::message::{CommandOutcome, DebugLogs, Enhancement, ExecutionReport};
use webrefactor_protocols::{
    AgentError, AgentReply, AgentRequest, AgentResponse, DamageSignal, DamageSignature,
    DetectorThresholds, MutationCommand, OriginalStateSnapshot, PageFingerprint, RollbackOutcome,
};

use crate::document::PageDocument;
use crate::executor::CommandExecutor;
use crate::extractor::extract_summary;
use crate::protection::ProtectionPolicy;
use crate::sampler::sample;
use crate::style;

/// Attribute carried by every overlay element.
pub const OVERLAY_ATTR: &str = "data-refactor-overlay";

/// Stylesheets injected by the agent carry this attribute.
pub const INJECTED_STYLE_SELECTOR: &str = "style[data-refactor]";

const OVERLAY_STYLESHEET: &str = r#"<style data-refactor="overlay">[data-refactor-overlay]{position:relative;pointer-events:none;z-index:2147483647;font:12px sans-serif;}</style>"#;
const DEFAULT_BOX_COLOR: &str = "#ff0000";

/// Events kept for `getDebugLogs`.
const MAX_EVENTS: usize = 50;

/// Tunables of one agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Commands executed between two fingerprint samples.
    pub sub_batch_size: usize,
    /// Pause after each sub-batch.
    pub sub_batch_yield: Duration,
    pub thresholds: DetectorThresholds,
    /// Extra id/class substrings the executor must not touch.
    pub protected_substrings: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            sub_batch_size: 10,
            sub_batch_yield: Duration::from_millis(50),
            thresholds: DetectorThresholds::default(),
            protected_substrings: Vec::new(),
        }
    }
}

/// Diagnostic state kept between requests.
#[derive(Debug, Default)]
struct DebugState {
    events: VecDeque<String>,
    last_before: Option<PageFingerprint>,
    last_after: Option<PageFingerprint>,
    last_batch: Vec<MutationCommand>,
    failed: Vec<CommandOutcome>,
    blocked: Vec<String>,
    skipped_protected: usize,
}

impl DebugState {
    fn event(&mut self, message: impl Into<String>) {
        if self.events.len() == MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(message.into());
    }
}

/// Page Agent for one document.
pub struct PageAgent {
    document: Arc<Mutex<PageDocument>>,
    executor: CommandExecutor,
    detector: WhitePageDetector,
    sub_batch_size: usize,
    sub_batch_yield: Duration,
    snapshot: Option<OriginalStateSnapshot>,
    debug: DebugState,
}

impl PageAgent {
    pub fn new(document: Arc<Mutex<PageDocument>>, settings: AgentSettings) -> Self {
        Self {
            document,
            executor: CommandExecutor::new(ProtectionPolicy::new(settings.protected_substrings)),
            detector: WhitePageDetector::new(settings.thresholds),
            sub_batch_size: settings.sub_batch_size.max(1),
            sub_batch_yield: settings.sub_batch_yield,
            snapshot: None,
            debug: DebugState::default(),
        }
    }

    pub fn document(&self) -> &Arc<Mutex<PageDocument>> {
        &self.document
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Answer requests until the mailbox closes.
    pub async fn serve(mut self, mut mailbox: Mailbox) {
        let tab = mailbox.tab();
        info!(%tab, "Page agent listening");
        while let Some(envelope) = mailbox.recv().await {
            let response = self.handle(envelope.request.clone()).await;
            envelope.reply(response);
        }
        debug!(%tab, "Page agent mailbox closed");
    }

    /// Handle one request.
    pub async fn handle(&mut self, request: AgentRequest) -> AgentResponse {
        let action = request.name();
        debug!(action, "Handling agent request");
        match request {
            AgentRequest::Ping => AgentResponse::ok(AgentReply::Pong),
            AgentRequest::ExtractContent => self.extract(),
            AgentRequest::ExecuteCommands { commands } => self.execute(commands).await,
            AgentRequest::Reset { original_state } => self.reset(original_state),
            AgentRequest::GetDebugLogs => AgentResponse::ok(AgentReply::DebugLogs(self.debug_logs())),
            AgentRequest::ApplyEnhancements { enhancements } => self.apply_enhancements(&enhancements),
            AgentRequest::ClearEnhancements => self.clear_enhancements(),
        }
    }

    fn extract(&mut self) -> AgentResponse {
        let doc = self.document.lock();
        let summary = extract_summary(&doc);
        let snapshot = self
            .snapshot
            .get_or_insert_with(|| OriginalStateSnapshot::new(doc.serialize(), doc.url()))
            .clone();
        drop(doc);
        self.debug.event(format!(
            "extractContent: {} ads, {} interactive",
            summary.advertisements.len(),
            summary.interactive_total
        ));
        AgentResponse::ok(AgentReply::Extracted { summary, snapshot })
    }

    async fn execute(&mut self, commands: Vec<MutationCommand>) -> AgentResponse {
        let before = {
            let doc = self.document.lock();
            if self.snapshot.is_none() {
                self.snapshot = Some(OriginalStateSnapshot::new(doc.serialize(), doc.url()));
            }
            sample(&doc)
        };

        let mut outcomes = Vec::with_capacity(commands.len());
        let mut blocked = Vec::new();
        let mut sub_batches = 0;
        let mut samples = 0;
        let mut damage = None;

        for (chunk_index, chunk) in commands.chunks(self.sub_batch_size).enumerate() {
            {
                let mut doc = self.document.lock();
                for (offset, command) in chunk.iter().enumerate() {
                    let index = chunk_index * self.sub_batch_size + offset;
                    let outcome = match SafetyGate::check(&command.selector) {
                        Ok(()) => self.executor.execute(&mut doc, index, command),
                        Err(rule) => {
                            warn!(selector = %command.selector, %rule, "Selector blocked by safety gate");
                            blocked.push(command.selector.clone());
                            gate_outcome(index, command, &rule.to_string())
                        }
                    };
                    outcomes.push(outcome);
                }
            }
            sub_batches += 1;

            tokio::time::sleep(self.sub_batch_yield).await;

            let current = sample(&self.document.lock());
            samples += 1;
            let verdict = self.detector.evaluate(&before, &current);
            if verdict.damaged {
                damage = Some((current, verdict.signals));
                break;
            }
        }

        let after = match damage {
            Some((after, signals)) => {
                return self.white_page(commands, outcomes, blocked, before, after, signals);
            }
            None => sample(&self.document.lock()),
        };
        samples += 1;
        let verdict = self.detector.evaluate(&before, &after);
        if verdict.damaged {
            return self.white_page(commands, outcomes, blocked, before, after, verdict.signals);
        }

        let skipped_protected = outcomes.iter().map(|o| o.skipped_protected).sum();
        self.record(&commands, &outcomes, &blocked, &before, &after, skipped_protected);
        self.debug.event(format!(
            "executeCommands: {} commands, {} sub-batches, {} failed",
            commands.len(),
            sub_batches,
            outcomes.iter().filter(|o| !o.succeeded()).count()
        ));
        info!(
            commands = commands.len(),
            sub_batches,
            skipped_protected,
            blocked = blocked.len(),
            "Batch executed"
        );

        AgentResponse::ok(AgentReply::Executed(ExecutionReport {
            outcomes,
            skipped_protected,
            blocked_selectors: blocked,
            before,
            after,
            sub_batches,
            samples,
        }))
    }

    fn white_page(
        &mut self,
        batch: Vec<MutationCommand>,
        outcomes: Vec<CommandOutcome>,
        blocked: Vec<String>,
        before: PageFingerprint,
        after: PageFingerprint,
        signals: Vec<DamageSignal>,
    ) -> AgentResponse {
        let skipped_protected = outcomes.iter().map(|o| o.skipped_protected).sum();
        self.record(&batch, &outcomes, &blocked, &before, &after, skipped_protected);

        let rollback = match self.snapshot.clone() {
            Some(snapshot) => match self.restore(&snapshot) {
                Ok(()) => RollbackOutcome::RolledBack,
                Err(err) => {
                    warn!(%err, "Local rollback failed");
                    RollbackOutcome::RollbackFailed
                }
            },
            None => RollbackOutcome::RollbackFailed,
        };
        warn!(?signals, %rollback, "White page detected");
        self.debug.event(format!("white page detected; local rollback {rollback}"));

        AgentResponse::white_page(
            "White page detected after executing commands",
            DamageSignature {
                before,
                after,
                batch,
                blocked_selectors: blocked,
                signals,
                rollback,
            },
        )
    }

    fn record(
        &mut self,
        batch: &[MutationCommand],
        outcomes: &[CommandOutcome],
        blocked: &[String],
        before: &PageFingerprint,
        after: &PageFingerprint,
        skipped_protected: usize,
    ) {
        self.debug.last_before = Some(before.clone());
        self.debug.last_after = Some(after.clone());
        self.debug.last_batch = batch.to_vec();
        self.debug.failed = outcomes.iter().filter(|o| !o.succeeded()).cloned().collect();
        self.debug.blocked = blocked.to_vec();
        self.debug.skipped_protected = skipped_protected;
    }

    /// Put the document back to a snapshot and drop everything the agent
    /// injected.
    fn restore(&mut self, snapshot: &OriginalStateSnapshot) -> Result<(), AgentError> {
        let mut doc = self.document.lock();
        doc.replace_markup(&snapshot.html);
        doc.remove_matching(INJECTED_STYLE_SELECTOR)?;
        doc.remove_matching(&format!("[{OVERLAY_ATTR}]"))?;
        if doc.body().is_none() {
            return Err(AgentError::RestoreFailed("document has no body".to_string()));
        }
        Ok(())
    }

    fn reset(&mut self, provided: Option<OriginalStateSnapshot>) -> AgentResponse {
        let used_fallback = provided.is_none();
        let Some(snapshot) = provided.or_else(|| self.snapshot.clone()) else {
            return AgentResponse::fail(AgentError::NoOriginalState.to_string());
        };
        match self.restore(&snapshot) {
            Ok(()) => {
                self.snapshot = None;
                self.debug.event(format!("reset: restored (fallback: {used_fallback})"));
                info!(used_fallback, "Page restored to original state");
                AgentResponse::ok(AgentReply::Restored { used_fallback })
            }
            Err(err) => {
                self.debug.event(format!("reset failed: {err}"));
                AgentResponse::fail(err.to_string())
            }
        }
    }

    fn debug_logs(&self) -> DebugLogs {
        DebugLogs {
            has_snapshot: self.snapshot.is_some(),
            last_before: self.debug.last_before.clone(),
            last_after: self.debug.last_after.clone(),
            last_batch: self.debug.last_batch.clone(),
            failed_commands: self.debug.failed.clone(),
            blocked_selectors: self.debug.blocked.clone(),
            skipped_protected: self.debug.skipped_protected,
            events: self.debug.events.iter().cloned().collect(),
        }
    }

    fn apply_enhancements(&mut self, enhancements: &[Enhancement]) -> AgentResponse {
        let mut doc = self.document.lock();
        if doc.first_match(INJECTED_STYLE_SELECTOR).ok().flatten().is_none() {
            if let (Some(head), Some(sheet)) = (doc.head().map(|h| h.id()), doc.import_fragment(OVERLAY_STYLESHEET)) {
                doc.append_child(head, sheet);
            }
        }

        for enhancement in enhancements {
            let target = match doc.first_match(enhancement.selector()) {
                Ok(Some(target)) => target,
                Ok(None) => {
                    debug!(selector = enhancement.selector(), "Enhancement target not found");
                    continue;
                }
                Err(err) => {
                    debug!(%err, "Enhancement selector rejected");
                    continue;
                }
            };
            if let Some(overlay) = doc.import_fragment(&overlay_markup(enhancement)) {
                doc.append_child(target, overlay);
            }
        }

        let active = doc
            .select_ids(&format!("[{OVERLAY_ATTR}]"))
            .map(|ids| ids.len())
            .unwrap_or(0);
        drop(doc);
        self.debug.event(format!("applyEnhancements: {active} active"));
        AgentResponse::ok(AgentReply::Enhancements { active })
    }

    fn clear_enhancements(&mut self) -> AgentResponse {
        let mut doc = self.document.lock();
        let removed = doc
            .remove_matching(&format!("[{OVERLAY_ATTR}]"))
            .and_then(|n| doc.remove_matching(INJECTED_STYLE_SELECTOR).map(|_| n));
        drop(doc);
        match removed {
            Ok(n) => {
                self.debug.event(format!("clearEnhancements: removed {n}"));
                AgentResponse::ok(AgentReply::Enhancements { active: 0 })
            }
            Err(err) => AgentResponse::fail(err.to_string()),
        }
    }
}

fn gate_outcome(index: usize, command: &MutationCommand, rule: &str) -> CommandOutcome {
    CommandOutcome {
        index,
        command_type: command.kind().to_string(),
        selector: command.selector.clone(),
        matched: 0,
        applied: 0,
        skipped_protected: 0,
        error: Some(format!("Selector blocked by safety gate: {rule}")),
    }
}

fn overlay_markup(enhancement: &Enhancement) -> String {
    match enhancement {
        Enhancement::DrawBox { color, label, .. } => {
            let color = color
                .as_deref()
                .filter(|c| style::is_valid_value(c) && !c.contains('"'))
                .unwrap_or(DEFAULT_BOX_COLOR);
            format!(
                r#"<div {OVERLAY_ATTR}="box" style="outline: 2px solid {color};">{}</div>"#,
                escape_text(label.as_deref().unwrap_or_default())
            )
        }
        Enhancement::AddText { text, .. } => {
            format!(r#"<div {OVERLAY_ATTR}="text">{}</div>"#, escape_text(text))
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
