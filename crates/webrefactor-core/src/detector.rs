//! White-page detector.
//!
//! Compares the fingerprint taken before a batch with one taken after it.
//! Aggressive ad stripping removes a lot of boxes and is fine; the
//! detector only fires when the evidence says no meaningful content is
//! left.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use webrefactor_protocols::{DamageSignal, DetectorThresholds, PageFingerprint};

/// Classification of one before/after transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub damaged: bool,
    /// Every rule that fired, critical and warning alike.
    pub signals: Vec<DamageSignal>,
}

impl Verdict {
    pub fn critical(&self) -> impl Iterator<Item = &DamageSignal> {
        self.signals.iter().filter(|s| s.is_critical())
    }
}

/// Pure fingerprint comparator.
#[derive(Debug, Clone, Default)]
pub struct WhitePageDetector {
    thresholds: DetectorThresholds,
}

impl WhitePageDetector {
    pub fn new(thresholds: DetectorThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DetectorThresholds {
        &self.thresholds
    }

    /// Classify the transition `before -> after`. Deterministic.
    pub fn evaluate(&self, before: &PageFingerprint, after: &PageFingerprint) -> Verdict {
        let t = &self.thresholds;
        let mut signals = Vec::new();

        if !after.body_present {
            signals.push(DamageSignal::BodyMissing);
        }

        if before.body_text_length >= t.text_collapse_min_before
            && below(after.body_text_length, before.body_text_length, t.text_collapse_ratio)
        {
            signals.push(DamageSignal::TextCollapsed);
        }

        if before.body_height >= t.height_collapse_min_before
            && after.body_height < t.height_collapse_max_after
        {
            signals.push(DamageSignal::HeightCollapsed);
        }

        if before.significant_elements > t.significant_collapse_min_before
            && below(
                after.significant_elements,
                before.significant_elements,
                t.significant_collapse_ratio,
            )
        {
            signals.push(DamageSignal::SignificantCollapsed);
        }

        if after.body_text_length < t.empty_max_text
            && after.significant_elements < t.empty_max_significant
            && after.body_height < t.empty_max_height
            && after.link_count == 0
            && after.form_control_count == 0
        {
            signals.push(DamageSignal::AbsoluteEmpty);
        }

        let critical = signals.len();

        if before.body_text_length >= t.warn_text_min_before
            && below(after.body_text_length, before.body_text_length, t.warn_text_ratio)
        {
            signals.push(DamageSignal::TextDropWarning);
        }

        if before.visible_elements > t.warn_visible_min_before
            && below(after.visible_elements, before.visible_elements, t.warn_visible_ratio)
        {
            signals.push(DamageSignal::VisibleDropWarning);
        }

        if before.content_container_count > t.warn_containers_min_before
            && after.content_container_count == 0
        {
            signals.push(DamageSignal::ContainersLostWarning);
        }

        let warnings = signals.len() - critical;
        let damaged = critical > 0 || warnings >= t.warnings_required;

        if damaged {
            warn!(?signals, "White page detected");
        } else if warnings > 0 {
            debug!(?signals, "Page shrank but survived");
        }

        Verdict { damaged, signals }
    }
}

/// `after < before * ratio`, in floating point.
fn below(after: usize, before: usize, ratio: f64) -> bool {
    (after as f64) < (before as f64) * ratio
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
