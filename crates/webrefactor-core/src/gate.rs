//! Selector safety gate.
//!
//! A static predicate over selector text. It rejects selectors that
//! would plausibly match the whole document and leaves everything else
//! alone; matching against a real page is the executor's job.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The pattern family that caused a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRule {
    /// `*` on its own.
    Universal,
    /// `html`, `body` or `:root` selected alone.
    RootOrBody,
    /// `body > *`, `body *`, `html > ...` and structurally identical forms.
    EverythingUnderRoot,
    /// `*:not(...)`, `body > *:not(...)`.
    NegationOverUniverse,
    /// `[class*="x"]`, `[id="x"]` and friends with a one-character value.
    SingleCharAttribute,
}

impl GateRule {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Universal => "universal selector",
            Self::RootOrBody => "selects the document root or body",
            Self::EverythingUnderRoot => "selects everything under the document root",
            Self::NegationOverUniverse => "negation over the universal selector",
            Self::SingleCharAttribute => "single-character attribute pattern",
        }
    }
}

impl fmt::Display for GateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

static NEGATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:html|body|:root)\s*>?\s*)*\*:not\(").expect("negation pattern is valid")
});

static UNDER_ROOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:html\s*>|:root\s*>|body\s*>\s*\*|body\s+\*)").expect("root pattern is valid")
});

static SHORT_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\[\s*(?:class|id)\s*[*^$~|]?=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s'"]*))\s*(?:[is]\s*)?\]"#,
    )
    .expect("attribute pattern is valid")
});

/// Compounds that on their own cover the whole document.
const ROOT_COMPOUNDS: [&str; 4] = ["*", "html", "body", ":root"];

/// The selector safety gate.
pub struct SafetyGate;

impl SafetyGate {
    /// `Ok(())` when the selector may be executed.
    ///
    /// A selector list is rejected when any of its comma-separated items
    /// is.
    pub fn check(selector: &str) -> Result<(), GateRule> {
        for item in split_selector_list(selector) {
            Self::check_item(&normalize(item))?;
        }
        Ok(())
    }

    pub fn is_safe(selector: &str) -> bool {
        Self::check(selector).is_ok()
    }

    fn check_item(item: &str) -> Result<(), GateRule> {
        if item.is_empty() {
            return Ok(());
        }

        if NEGATION.is_match(item) {
            return Err(GateRule::NegationOverUniverse);
        }

        if UNDER_ROOT.is_match(item) {
            return Err(GateRule::EverythingUnderRoot);
        }

        let compounds = compounds(item);
        if !compounds.is_empty() && compounds.iter().all(|c| ROOT_COMPOUNDS.contains(c)) {
            return Err(match compounds.as_slice() {
                ["*"] => GateRule::Universal,
                [_] => GateRule::RootOrBody,
                _ => GateRule::EverythingUnderRoot,
            });
        }

        for caps in SHORT_ATTRIBUTE.captures_iter(item) {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            if value.chars().count() == 1 {
                return Err(GateRule::SingleCharAttribute);
            }
        }

        Ok(())
    }
}

/// Lowercase, trim and collapse whitespace runs.
fn normalize(item: &str) -> String {
    item.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Split a selector list on commas that are not inside parentheses,
/// brackets or quotes.
pub(crate) fn split_selector_list(selector: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in selector.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth -= 1,
            (None, ',') if depth <= 0 => {
                items.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(selector[start..].trim());
    items
}

/// Compound selectors of one normalized item, combinators dropped.
fn compounds(item: &str) -> Vec<&str> {
    item.split(|c: char| c == ' ' || c == '>' || c == '+' || c == '~')
        .filter(|s| !s.is_empty())
        .collect()
}
