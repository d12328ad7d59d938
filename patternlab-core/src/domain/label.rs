//! Pattern label newtype.
//!
//! Labels are always plain strings. Older library blobs occasionally stored a
//! map (`{"label": "..."}`) in this position; those are coerced once by the
//! load migration in `library::persist`, never here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to mirrored labels that carry no bullish/bearish wording.
pub const INVERTED_SUFFIX: &str = "_inverted";

const BULLISH: &str = "bullish";
const BEARISH: &str = "bearish";

/// A template's class tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Label for the vertically mirrored version of a pattern.
    ///
    /// Swaps every `bullish`/`bearish` occurrence (case-insensitive, keeping
    /// the casing of each letter). Labels without either word get
    /// `_inverted` appended unless they already carry it.
    pub fn mirrored(&self) -> Label {
        let lower = self.0.to_ascii_lowercase();
        if lower.contains(BULLISH) || lower.contains(BEARISH) {
            return Label(swap_direction_words(&self.0, &lower));
        }
        if lower.contains(INVERTED_SUFFIX) {
            return self.clone();
        }
        Label(format!("{}{INVERTED_SUFFIX}", self.0))
    }
}

/// `lower` must be `original.to_ascii_lowercase()` so byte offsets line up.
fn swap_direction_words(original: &str, lower: &str) -> String {
    let mut out = String::with_capacity(original.len());
    let mut i = 0;
    while i < original.len() {
        let rest = &lower[i..];
        let replacement = if rest.starts_with(BULLISH) {
            Some(BEARISH)
        } else if rest.starts_with(BEARISH) {
            Some(BULLISH)
        } else {
            None
        };
        match replacement {
            Some(word) => {
                let source = &original[i..i + word.len()];
                for (src, dst) in source.chars().zip(word.chars()) {
                    if src.is_ascii_uppercase() {
                        out.push(dst.to_ascii_uppercase());
                    } else {
                        out.push(dst);
                    }
                }
                i += word.len();
            }
            None => {
                // Advance one full character to stay on a UTF-8 boundary.
                let ch = original[i..].chars().next().unwrap_or_default();
                out.push(ch);
                i += ch.len_utf8().max(1);
            }
        }
    }
    out
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl From<String> for Label {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Label {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Label {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_swaps_bullish_and_bearish() {
        assert_eq!(Label::from("bullish_flag").mirrored(), "bearish_flag");
        assert_eq!(Label::from("Bearish Engulf").mirrored(), "Bullish Engulf");
        assert_eq!(Label::from("BULLISH_PENNANT").mirrored(), "BEARISH_PENNANT");
    }

    #[test]
    fn mirror_swaps_every_occurrence_once() {
        assert_eq!(
            Label::from("bullish_to_bearish").mirrored(),
            "bearish_to_bullish"
        );
    }

    #[test]
    fn mirror_appends_inverted_suffix() {
        assert_eq!(Label::from("head_and_shoulders").mirrored(), "head_and_shoulders_inverted");
    }

    #[test]
    fn mirror_keeps_existing_inverted_suffix() {
        assert_eq!(Label::from("cup_Inverted").mirrored(), "cup_Inverted");
    }

    #[test]
    fn mirror_handles_non_ascii() {
        assert_eq!(Label::from("décembre").mirrored(), "décembre_inverted");
        assert_eq!(Label::from("🐂 bullish").mirrored(), "🐂 bearish");
    }

    #[test]
    fn label_serializes_as_string() {
        let label = Label::from("double_top");
        assert_eq!(serde_json::to_string(&label).unwrap(), "\"double_top\"");
    }

    #[test]
    fn map_shaped_label_is_rejected_by_the_newtype() {
        let result: Result<Label, _> = serde_json::from_str(r#"{"label":"x"}"#);
        assert!(result.is_err());
    }
}
