//! Elements the executor must not touch.
//!
//! Two tiers: structural targets (document element, head, body and
//! anything inside head) are dropped from a command's match set without
//! comment; protected elements (page machinery and CSS carriers) are
//! skipped and counted.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

/// Tags whose removal breaks the page rather than its content.
const PROTECTED_TAGS: [&str; 4] = ["script", "style", "meta", "link"];

static CSS_TEXT: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\.[\w-]+\s*\{", r"#[\w-]+\s*\{", r"\w+\s*:\s*[\w-]+;"]
        .iter()
        .map(|p| Regex::new(p).expect("css pattern is valid"))
        .collect()
});

/// Protection rules for one agent.
#[derive(Debug, Clone, Default)]
pub struct ProtectionPolicy {
    substrings: Vec<String>,
}

impl ProtectionPolicy {
    /// Extra lowercase id/class substrings to protect on top of the
    /// structural tags.
    pub fn new(substrings: impl IntoIterator<Item = String>) -> Self {
        Self {
            substrings: substrings
                .into_iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Document element, head, body, or something inside head.
    pub fn is_structural(&self, element: ElementRef<'_>) -> bool {
        match element.value().name() {
            "html" | "head" | "body" => true,
            _ => element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| a.value().name() == "head"),
        }
    }

    pub fn is_protected(&self, element: ElementRef<'_>) -> bool {
        let el = element.value();
        let tag = el.name();
        if PROTECTED_TAGS.contains(&tag) {
            return true;
        }

        let id = el.id().unwrap_or_default().to_ascii_lowercase();
        let class = el.attr("class").unwrap_or_default().to_ascii_lowercase();

        let names_css = |s: &str| s.contains("css") || s.contains("style");
        if tag == "textarea" && (names_css(&id) || names_css(&class)) {
            return true;
        }

        if self
            .substrings
            .iter()
            .any(|s| id.contains(s.as_str()) || class.contains(s.as_str()))
        {
            return true;
        }

        if matches!(tag, "textarea" | "pre" | "code") {
            let text: String = element.text().collect();
            return looks_like_css(&text);
        }
        false
    }
}

/// Whether a text reads like a stylesheet.
pub fn looks_like_css(text: &str) -> bool {
    CSS_TEXT.iter().any(|re| re.is_match(text))
}
