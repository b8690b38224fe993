//! LLM response parser.
//!
//! Raw text in, either a non-empty batch plus the list of rejected
//! actions, or a [`ParseError`]. Rejections are returned either way so
//! the retry loop can tell the model which selectors were blocked.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use webrefactor_protocols::MutationCommand;

use crate::error::{ParseError, SchemaViolation};
use crate::gate::{GateRule, SafetyGate};
use crate::repair;
use crate::schema;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?si)```\s*json[^\n]*\n?(.*?)(?:```|\z)").expect("fence pattern is valid")
});

/// Keys that never hold a misplaced selector.
const STRUCTURAL_KEYS: [&str; 7] = [
    "type",
    "reason",
    "cssProperties",
    "targetSelector",
    "position",
    "wrapperHtml",
    "newOrder",
];

/// Why an action did not make it into the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum RejectionReason {
    Schema { violation: String },
    Gate { rule: GateRule },
}

/// One refused action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Position in the `actions` list.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub reason: RejectionReason,
}

impl Rejection {
    fn schema(index: usize, selector: Option<String>, violation: SchemaViolation) -> Self {
        Self {
            index,
            selector,
            reason: RejectionReason::Schema {
                violation: violation.to_string(),
            },
        }
    }

    pub fn is_gate(&self) -> bool {
        matches!(self.reason, RejectionReason::Gate { .. })
    }
}

/// Commands that survived validation, plus what did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    pub commands: Vec<MutationCommand>,
    pub rejections: Vec<Rejection>,
}

impl ParsedBatch {
    pub fn blocked_selectors(&self) -> Vec<String> {
        gate_blocked(&self.rejections)
    }
}

pub(crate) fn gate_blocked(rejections: &[Rejection]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in rejections.iter().filter(|r| r.is_gate()) {
        if let Some(sel) = &r.selector {
            if !out.contains(sel) {
                out.push(sel.clone());
            }
        }
    }
    out
}

/// The LLM response parser.
#[derive(Debug, Default, Clone)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse raw assistant text into a validated, gate-filtered batch.
    pub fn parse(&self, text: &str) -> Result<ParsedBatch, ParseError> {
        let actions = extract_actions(text).ok_or_else(|| {
            warn!(len = text.len(), "No command batch found in LLM reply");
            ParseError::NoBatch
        })?;

        let mut batch = ParsedBatch::default();
        for (index, raw) in actions.into_iter().enumerate() {
            let action = promote_selector(raw);
            let selector = action
                .get("selector")
                .and_then(Value::as_str)
                .map(str::to_string);

            let command = match schema::validate_action(&action) {
                Ok(cmd) => cmd,
                Err(violation) => {
                    debug!(index, %violation, "Action rejected by schema");
                    batch
                        .rejections
                        .push(Rejection::schema(index, selector, violation));
                    continue;
                }
            };

            if let Err(rule) = SafetyGate::check(&command.selector) {
                warn!(index, selector = %command.selector, %rule, "Selector blocked by safety gate");
                batch.rejections.push(Rejection {
                    index,
                    selector: Some(command.selector),
                    reason: RejectionReason::Gate { rule },
                });
                continue;
            }

            batch.commands.push(command);
        }

        debug!(
            accepted = batch.commands.len(),
            rejected = batch.rejections.len(),
            "Parsed LLM reply"
        );

        if batch.commands.is_empty() {
            return Err(ParseError::NoValidCommands {
                rejections: batch.rejections,
            });
        }
        Ok(batch)
    }
}

/// Run the extraction strategies in order; first usable `actions` wins.
fn extract_actions(text: &str) -> Option<Vec<Value>> {
    if let Some(caps) = FENCED_JSON.captures(text) {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if let Some(actions) = parse_envelope(body) {
            return Some(actions);
        }
        if let Some(actions) = smallest_actions_object(body).and_then(parse_envelope) {
            return Some(actions);
        }
    }

    if let Some(actions) = smallest_actions_object(text).and_then(parse_envelope) {
        return Some(actions);
    }

    let mut objects = balanced_objects(text);
    objects.sort_by_key(|o| std::cmp::Reverse(o.len()));
    for obj in objects.into_iter().filter(|o| o.contains("\"actions\"")) {
        if let Some(actions) = parse_envelope(obj) {
            return Some(actions);
        }
    }

    command_array(text)
}

/// Parse a candidate, repairing on failure, and pull out `actions`.
fn parse_envelope(candidate: &str) -> Option<Vec<Value>> {
    let value = parse_lenient(candidate)?;
    match value {
        Value::Object(mut obj) => match obj.remove("actions") {
            Some(Value::Array(actions)) => Some(actions),
            _ => None,
        },
        _ => None,
    }
}

fn parse_lenient(candidate: &str) -> Option<Value> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    serde_json::from_str(candidate).ok().or_else(|| {
        let repaired = repair::repair(candidate);
        serde_json::from_str(&repaired).ok()
    })
}

/// The innermost object enclosing the first `"actions"` key, running to
/// the end of the text when it never closes.
fn smallest_actions_object(text: &str) -> Option<&str> {
    let key = text.find("\"actions\"")?;
    let bytes = text.as_bytes();

    let mut depth = 0i32;
    let mut open = None;
    for i in (0..key).rev() {
        match bytes[i] {
            b'}' => depth += 1,
            b'{' if depth == 0 => {
                open = Some(i);
                break;
            }
            b'{' => depth -= 1,
            _ => {}
        }
    }
    let open = open?;
    let end = balanced_end(bytes, open).unwrap_or(bytes.len());
    Some(&text[open..end])
}

/// Index just past the bracket matching the one at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Every top-level balanced `{...}` in the text.
fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = balanced_end(bytes, i) {
                out.push(&text[i..end]);
                i = end;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Fallback: an array of objects that carry `type` and `selector`.
fn command_array(text: &str) -> Option<Vec<Value>> {
    let bytes = text.as_bytes();
    for (start, _) in text.match_indices('[') {
        let rest = text[start + 1..].trim_start();
        if !rest.starts_with('{') {
            continue;
        }
        let end = balanced_end(bytes, start).unwrap_or(bytes.len());
        let candidate = &text[start..end];
        if !(candidate.contains("\"type\"") && candidate.contains("\"selector\"")) {
            continue;
        }
        if let Some(Value::Array(items)) = parse_lenient(candidate) {
            if items
                .iter()
                .any(|v| v.get("type").is_some() && v.get("selector").is_some())
            {
                debug!("Recovered actions from a bare command array");
                return Some(items);
            }
        }
    }
    None
}

/// Move a selector-looking key into `selector` when the field is missing
/// and exactly one such key exists.
fn promote_selector(action: Value) -> Value {
    let Value::Object(mut obj) = action else {
        return action;
    };
    let has_selector = obj
        .get("selector")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if has_selector {
        return Value::Object(obj);
    }

    let candidates: Vec<String> = obj
        .keys()
        .filter(|k| !STRUCTURAL_KEYS.contains(&k.as_str()) && k.as_str() != "selector")
        .filter(|k| k.contains(|c| matches!(c, '.' | '#' | '[' | ':')))
        .cloned()
        .collect();

    if let [key] = candidates.as_slice() {
        debug!(key = %key, "Promoting misplaced property name to selector");
        obj.remove(key);
        obj.insert("selector".to_string(), Value::String(key.clone()));
    }
    Value::Object(obj)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
