//! Haptic feedback derived from streamed transcript text
//!
//! Every transcript fragment from the engine is classified into an urgency
//! category; each category maps to a fixed vibration waveform. Classification
//! is a pure function so identical fragments always produce the same result.

use tracing::info;

/// Urgency category for a transcript fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticCategory {
    Danger,
    Caution,
    Clear,
}

/// A named vibration sequence (alternating on/off durations in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticPattern {
    pub category: HapticCategory,
    pub waveform_ms: &'static [u64],
}

const DANGER_WAVEFORM: &[u64] = &[
    100, 50, 100, 50, 100, 200, 500, 200, 500, 200, 500, 200, 100, 50, 100, 50, 100,
];
const CAUTION_WAVEFORM: &[u64] = &[200, 100, 200];
const CLEAR_WAVEFORM: &[u64] = &[50];

const DANGER_KEYWORDS: &[&str] = &["stop", "danger", "wait"];
const CAUTION_KEYWORDS: &[&str] = &["caution", "careful", "warning"];
const CLEAR_KEYWORDS: &[&str] = &["clear", "proceed", "go ahead"];

impl HapticCategory {
    pub fn pattern(self) -> HapticPattern {
        let waveform_ms = match self {
            HapticCategory::Danger => DANGER_WAVEFORM,
            HapticCategory::Caution => CAUTION_WAVEFORM,
            HapticCategory::Clear => CLEAR_WAVEFORM,
        };
        HapticPattern {
            category: self,
            waveform_ms,
        }
    }
}

/// Classify a transcript fragment into an urgency category.
///
/// Categories are checked in priority order: danger keywords win over
/// caution and clear keywords when a fragment contains several matches.
/// Returns `None` when no keyword matches.
pub fn classify(text: &str) -> Option<HapticCategory> {
    let lower = text.to_lowercase();

    if DANGER_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Some(HapticCategory::Danger)
    } else if CAUTION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Some(HapticCategory::Caution)
    } else if CLEAR_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Some(HapticCategory::Clear)
    } else {
        None
    }
}

/// Tactile output primitive
pub trait HapticSink: Send + Sync {
    fn vibrate(&self, pattern: &HapticPattern);
}

/// Default sink that only logs the triggered pattern.
///
/// Real tactile hardware lives behind this trait in the host application.
pub struct LogHapticSink;

impl HapticSink for LogHapticSink {
    fn vibrate(&self, pattern: &HapticPattern) {
        info!(
            "Haptic pattern triggered: {:?} ({} pulses)",
            pattern.category,
            pattern.waveform_ms.len().div_ceil(2)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_danger_takes_precedence() {
        assert_eq!(
            classify("Please wait, stop now"),
            Some(HapticCategory::Danger)
        );
        // Fragment matching both danger and clear keywords
        assert_eq!(
            classify("Stop! The path ahead is clear"),
            Some(HapticCategory::Danger)
        );
    }

    #[test]
    fn test_caution_classification() {
        assert_eq!(
            classify("Caution, uneven ground"),
            Some(HapticCategory::Caution)
        );
        assert_eq!(
            classify("Be careful near the edge"),
            Some(HapticCategory::Caution)
        );
    }

    #[test]
    fn test_clear_classification() {
        assert_eq!(
            classify("Path is clear, proceed"),
            Some(HapticCategory::Clear)
        );
        assert_eq!(classify("You can go ahead"), Some(HapticCategory::Clear));
    }

    #[test]
    fn test_no_pattern_for_neutral_text() {
        assert_eq!(classify("You are near a bench"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("DANGER ahead"), Some(HapticCategory::Danger));
        assert_eq!(classify("WaRnInG"), Some(HapticCategory::Caution));
    }

    #[test]
    fn test_deterministic() {
        let input = "Caution, there is a step down";
        assert_eq!(classify(input), classify(input));
    }

    #[test]
    fn test_pattern_waveforms() {
        assert_eq!(HapticCategory::Clear.pattern().waveform_ms, &[50]);
        assert_eq!(
            HapticCategory::Caution.pattern().waveform_ms,
            &[200, 100, 200]
        );
        assert_eq!(HapticCategory::Danger.pattern().waveform_ms.len(), 17);
    }
}
