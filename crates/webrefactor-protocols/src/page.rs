//! Page-side data: fingerprints, summaries and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compact numeric summary of a page's visible/content state at one instant.
///
/// Only ever compared pairwise (before/after one mutation batch); never
/// persisted across reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFingerprint {
    /// Whether the document has a body element.
    pub body_present: bool,
    /// Rendered body height in pixels.
    pub body_height: u32,
    /// Rendered body width in pixels.
    pub body_width: u32,
    /// Visible text of the body, whitespace-trimmed, in characters.
    pub body_text_length: usize,
    /// Elements with a positive box that are not hidden.
    pub visible_elements: usize,
    /// Visible content-bearing elements holding at least 10 trimmed characters.
    pub significant_elements: usize,
    pub heading_count: usize,
    pub link_count: usize,
    pub image_count: usize,
    pub form_control_count: usize,
    pub content_container_count: usize,
    /// Milliseconds on a process-local monotonic clock.
    pub timestamp_ms: u64,
}

/// Restorable copy of a page taken before the first mutation.
///
/// Restoring from a snapshot replaces document markup wholesale: script
/// state and unsaved form input are not preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalStateSnapshot {
    /// Full serialized document markup.
    pub html: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

impl OriginalStateSnapshot {
    pub fn new(html: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            url: url.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Structural view of a page sent to the LLM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub title: String,
    pub url: String,
    pub structure: ContentStructure,
    /// Candidate advertisement elements, at most [`PageSummary::MAX_ADS`].
    #[serde(default)]
    pub advertisements: Vec<AdCandidate>,
    /// Interactive elements, at most [`PageSummary::MAX_INTERACTIVE`].
    #[serde(default)]
    pub interactive_elements: Vec<InteractiveElement>,
    /// Number of interactive elements found before truncation.
    #[serde(default)]
    pub interactive_total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutHint>,
    /// Leading text blocks of the body, each truncated.
    #[serde(default)]
    pub text_blocks: Vec<String>,
}

impl PageSummary {
    pub const MAX_ADS: usize = 20;
    pub const MAX_INTERACTIVE: usize = 50;
    pub const MAX_TEXT_BLOCKS: usize = 10;
}

/// Element counts by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStructure {
    pub headings: usize,
    pub paragraphs: usize,
    pub lists: usize,
    pub links: usize,
    pub images: usize,
    pub videos: usize,
    pub forms: usize,
    pub inputs: usize,
}

/// An element that looks like an advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCandidate {
    pub selector: String,
    /// Leading text sample.
    pub text: String,
    pub tag_name: String,
    pub reason: String,
}

/// An element the user can interact with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveElement {
    pub selector: String,
    pub tag_name: String,
    /// The `type` attribute, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub classes: String,
    pub text: String,
    /// Heuristic label such as `navigation`, `search` or `advertisement`.
    pub purpose: String,
    /// Hint that removing this element is unlikely to hurt the page.
    pub can_be_removed: bool,
}

/// Coarse page layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutHint {
    pub has_header: bool,
    pub has_nav: bool,
    pub has_main: bool,
    pub has_sidebar: bool,
    pub has_footer: bool,
    /// Selector of the main content region, when one was recognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_selector: Option<String>,
}

/// Tunables of the white-page detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    /// Text collapse applies when the body held at least this many characters.
    pub text_collapse_min_before: usize,
    /// Text collapse fires when `after < before * ratio`.
    pub text_collapse_ratio: f64,
    pub height_collapse_min_before: u32,
    pub height_collapse_max_after: u32,
    /// Significant-element collapse applies when `before` is strictly above this.
    pub significant_collapse_min_before: usize,
    pub significant_collapse_ratio: f64,
    pub empty_max_text: usize,
    pub empty_max_significant: usize,
    pub empty_max_height: u32,
    pub warn_text_min_before: usize,
    pub warn_text_ratio: f64,
    /// Visible-element warning applies when `before` is strictly above this.
    pub warn_visible_min_before: usize,
    pub warn_visible_ratio: f64,
    /// Container warning applies when `before` is strictly above this.
    pub warn_containers_min_before: usize,
    /// Number of warnings that together count as damage.
    pub warnings_required: usize,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            text_collapse_min_before: 500,
            text_collapse_ratio: 0.05,
            height_collapse_min_before: 500,
            height_collapse_max_after: 30,
            significant_collapse_min_before: 5,
            significant_collapse_ratio: 0.10,
            empty_max_text: 20,
            empty_max_significant: 2,
            empty_max_height: 50,
            warn_text_min_before: 200,
            warn_text_ratio: 0.30,
            warn_visible_min_before: 20,
            warn_visible_ratio: 0.20,
            warn_containers_min_before: 2,
            warnings_required: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_camel_case() {
        let fp = PageFingerprint {
            body_present: true,
            body_text_length: 42,
            ..Default::default()
        };
        let value = serde_json::to_value(&fp).unwrap();
        assert_eq!(value["bodyPresent"], true);
        assert_eq!(value["bodyTextLength"], 42);
    }

    #[test]
    fn test_thresholds_partial_override() {
        let t: DetectorThresholds =
            serde_json::from_str(r#"{"warnings_required": 2}"#).unwrap();
        assert_eq!(t.warnings_required, 2);
        assert_eq!(t.text_collapse_min_before, 500);
    }

    #[test]
    fn test_summary_defaults_on_missing_lists() {
        let s: PageSummary = serde_json::from_str(
            r#"{"title":"t","url":"https://a.test/","structure":{"headings":1,"paragraphs":0,"lists":0,"links":0,"images":0,"videos":0,"forms":0,"inputs":0}}"#,
        )
        .unwrap();
        assert!(s.advertisements.is_empty());
        assert!(s.layout.is_none());
    }
}
