//! Mutation command executor.
//!
//! Applies one command to the document and reports what happened. A
//! failing command produces an outcome with an error; it never aborts the
//! batch.

use std::collections::BTreeMap;

use ego_tree::NodeId;
use tracing::debug;
use webrefactor_core::schema;
use webrefactor_protocols::message::CommandOutcome;
use webrefactor_protocols::{AgentError, CommandAction, MovePosition, MutationCommand};

use crate::document::{Fragment, PageDocument, parse_selector};
use crate::protection::ProtectionPolicy;
use crate::style::{self, InlineStyle};

pub const HIDDEN_ATTR: &str = "data-refactor-hidden";
pub const STYLED_ATTR: &str = "data-refactor-styled";
pub const MOVED_ATTR: &str = "data-refactor-moved";
pub const WRAPPER_ATTR: &str = "data-refactor-wrapper";
pub const REORDERED_ATTR: &str = "data-refactor-reordered";

/// What one command did, before it is turned into an outcome.
#[derive(Debug, Default)]
struct Applied {
    matched: usize,
    applied: usize,
    skipped_protected: usize,
}

/// Matches of a selector with structural elements filtered out.
struct Targets {
    matched: usize,
    ids: Vec<NodeId>,
}

/// Executes commands against a [`PageDocument`].
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    protection: ProtectionPolicy,
}

impl CommandExecutor {
    pub fn new(protection: ProtectionPolicy) -> Self {
        Self { protection }
    }

    pub fn protection(&self) -> &ProtectionPolicy {
        &self.protection
    }

    /// Execute one command. The command's position in its batch is echoed
    /// back in the outcome.
    pub fn execute(&self, doc: &mut PageDocument, index: usize, command: &MutationCommand) -> CommandOutcome {
        let mut outcome = CommandOutcome {
            index,
            command_type: command.kind().to_string(),
            selector: command.selector.clone(),
            matched: 0,
            applied: 0,
            skipped_protected: 0,
            error: None,
        };

        let result = schema::validate_command(command)
            .map_err(|v| AgentError::InvalidCommand(v.to_string()))
            .and_then(|()| self.apply(doc, command));

        match result {
            Ok(done) => {
                outcome.matched = done.matched;
                outcome.applied = done.applied;
                outcome.skipped_protected = done.skipped_protected;
                debug!(
                    index,
                    kind = command.kind(),
                    selector = %command.selector,
                    applied = done.applied,
                    skipped = done.skipped_protected,
                    "Command applied"
                );
            }
            Err(err) => {
                debug!(index, kind = command.kind(), selector = %command.selector, %err, "Command failed");
                outcome.error = Some(err.to_string());
            }
        }
        outcome
    }

    fn apply(&self, doc: &mut PageDocument, command: &MutationCommand) -> Result<Applied, AgentError> {
        let targets = self.targets(doc, &command.selector)?;
        match &command.action {
            CommandAction::Hide => Ok(self.hide(doc, targets)),
            CommandAction::Remove => Ok(self.remove(doc, targets)),
            CommandAction::Style { css_properties } => self.style(doc, targets, css_properties),
            CommandAction::Move {
                target_selector,
                position,
            } => self.relocate(doc, targets, target_selector, *position),
            CommandAction::Wrap { wrapper_html } => self.wrap(doc, targets, wrapper_html),
            CommandAction::ReorderChildren { new_order } => Ok(self.reorder(doc, targets, new_order)),
        }
    }

    fn targets(&self, doc: &PageDocument, selector: &str) -> Result<Targets, AgentError> {
        let ids = doc.select_ids(selector)?;
        if ids.is_empty() {
            return Err(AgentError::NoMatch(selector.to_string()));
        }
        let matched = ids.len();
        let ids = ids
            .into_iter()
            .filter(|id| {
                doc.element(*id)
                    .is_some_and(|e| !self.protection.is_structural(e))
            })
            .collect();
        Ok(Targets { matched, ids })
    }

    fn is_protected(&self, doc: &PageDocument, id: NodeId) -> bool {
        doc.element(id).is_some_and(|e| self.protection.is_protected(e))
    }

    /// Split targets into the ones to mutate and a protected count.
    fn unprotected(&self, doc: &PageDocument, targets: Targets) -> (Vec<NodeId>, Applied) {
        let mut done = Applied {
            matched: targets.matched,
            ..Applied::default()
        };
        let ids = targets
            .ids
            .into_iter()
            .filter(|id| {
                let protected = self.is_protected(doc, *id);
                if protected {
                    done.skipped_protected += 1;
                }
                !protected
            })
            .collect();
        (ids, done)
    }

    fn hide(&self, doc: &mut PageDocument, targets: Targets) -> Applied {
        let (ids, mut done) = self.unprotected(doc, targets);
        for id in ids {
            let mut inline = doc.style(id);
            inline.set("display", "none", true);
            doc.set_style(id, &inline);
            doc.set_attribute(id, HIDDEN_ATTR, "true");
            done.applied += 1;
        }
        done
    }

    fn remove(&self, doc: &mut PageDocument, targets: Targets) -> Applied {
        let (ids, mut done) = self.unprotected(doc, targets);
        for id in ids {
            doc.detach(id);
            done.applied += 1;
        }
        done
    }

    fn style(
        &self,
        doc: &mut PageDocument,
        targets: Targets,
        properties: &BTreeMap<String, String>,
    ) -> Result<Applied, AgentError> {
        let mut accepted = InlineStyle::default();
        for (property, value) in properties {
            if !style::is_valid_property(property) || !style::is_valid_value(value) {
                debug!(%property, %value, "Dropping unsafe style declaration");
                continue;
            }
            let value = value.trim();
            match value.to_ascii_lowercase().strip_suffix("!important") {
                Some(rest) => accepted.set(property, value[..rest.len()].trim_end(), true),
                None => accepted.set(property, value, false),
            }
        }
        if accepted.is_empty() {
            return Err(AgentError::InvalidCommand(
                "style: no valid CSS properties".to_string(),
            ));
        }

        let (ids, mut done) = self.unprotected(doc, targets);
        for id in ids {
            let mut inline = doc.style(id);
            for d in accepted.declarations() {
                inline.set(&d.property, &d.value, d.important);
            }
            doc.set_style(id, &inline);
            doc.set_attribute(id, STYLED_ATTR, "true");
            done.applied += 1;
        }
        Ok(done)
    }

    fn relocate(
        &self,
        doc: &mut PageDocument,
        targets: Targets,
        target_selector: &str,
        position: MovePosition,
    ) -> Result<Applied, AgentError> {
        let target = doc
            .first_match(target_selector)?
            .ok_or_else(|| AgentError::TargetNotFound(target_selector.to_string()))?;

        let (ids, mut done) = self.unprotected(doc, targets);
        let mut cyclic = 0;
        let mut anchor: Option<NodeId> = None;
        for id in ids {
            if doc.contains(id, target) {
                cyclic += 1;
                continue;
            }
            match (position, anchor) {
                (MovePosition::Before, _) => doc.insert_before(target, id),
                (MovePosition::Append, _) => doc.append_child(target, id),
                (MovePosition::After, None) => doc.insert_after(target, id),
                (MovePosition::Prepend, None) => doc.prepend_child(target, id),
                (MovePosition::After | MovePosition::Prepend, Some(last)) => doc.insert_after(last, id),
            }
            anchor = Some(id);
            doc.set_attribute(id, MOVED_ATTR, "true");
            done.applied += 1;
        }

        if done.applied == 0 && cyclic > 0 {
            return Err(AgentError::CyclicMove(target_selector.to_string()));
        }
        Ok(done)
    }

    fn wrap(&self, doc: &mut PageDocument, targets: Targets, markup: &str) -> Result<Applied, AgentError> {
        let fragment =
            Fragment::parse(markup).ok_or_else(|| AgentError::InvalidFragment(markup.to_string()))?;
        let (ids, mut done) = self.unprotected(doc, targets);
        for id in ids {
            let Some(wrapper) = doc.import(&fragment) else {
                break;
            };
            doc.insert_before(id, wrapper);
            doc.append_child(wrapper, id);
            doc.set_attribute(wrapper, WRAPPER_ATTR, "true");
            done.applied += 1;
        }
        Ok(done)
    }

    fn reorder(&self, doc: &mut PageDocument, targets: Targets, new_order: &[String]) -> Applied {
        let (ids, mut done) = self.unprotected(doc, targets);
        let Some(&parent) = ids.first() else {
            return done;
        };

        let children: Vec<NodeId> = doc
            .element(parent)
            .map(|p| {
                p.children()
                    .filter(|c| c.value().is_element())
                    .map(|c| c.id())
                    .collect()
            })
            .unwrap_or_default();

        let mut ordered: Vec<NodeId> = Vec::with_capacity(children.len());
        for child_selector in new_order {
            let Ok(selector) = parse_selector(child_selector) else {
                debug!(child_selector = %child_selector, "Skipping unparsable child selector");
                continue;
            };
            for &child in &children {
                let matches = doc
                    .element(child)
                    .is_some_and(|c| selector.matches(&c));
                if matches && !ordered.contains(&child) {
                    ordered.push(child);
                }
            }
        }
        let rest: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|c| !ordered.contains(c))
            .collect();

        for child in ordered.into_iter().chain(rest) {
            doc.append_child(parent, child);
        }
        doc.set_attribute(parent, REORDERED_ATTR, "true");
        done.applied = 1;
        done
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
