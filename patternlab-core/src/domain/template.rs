//! Template — a stored, labeled reference pattern.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Bar, Label, TemplateId};

/// Placeholder used when the caller supplies no symbol/timeframe.
pub const UNKNOWN: &str = "UNKNOWN";

/// How an augmented template was derived from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AugmentationType {
    /// Vertically flipped: normalized signal negated.
    Mirror,
}

/// Upper/lower LB_Keogh envelope of a template's comparison signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

impl Envelope {
    pub fn len(&self) -> usize {
        self.upper.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upper.is_empty()
    }
}

/// Caller-supplied metadata for a new template. Missing fields fall back to
/// `UNKNOWN` and the window's own first/last timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

impl TemplateMetadata {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            timeframe: Some(timeframe.into()),
            ..Self::default()
        }
    }
}

/// A labeled pattern template.
///
/// `normalized.len()` equals `bars_count` when the extractor used raw prices
/// and `bars_count - 1` when it used first differences. `envelope` is only
/// present after the library index has been built and is recomputed on every
/// rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub label: Label,
    pub raw_data: Vec<Bar>,
    pub normalized: Vec<f64>,

    pub symbol: String,
    pub timeframe: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub bars_count: usize,

    #[serde(default)]
    pub is_augmented: bool,
    #[serde(default)]
    pub augmentation_type: Option<AugmentationType>,
    /// Back-reference to the template this one was derived from.
    #[serde(default)]
    pub parent_id: Option<TemplateId>,

    pub quality_score: f64,

    #[serde(default)]
    pub envelope: Option<Envelope>,
}

impl Template {
    /// Build the mirrored sibling of this template (negated signal,
    /// direction-swapped label). Raw window and quality are copied as-is.
    pub fn mirrored(&self) -> Template {
        Template {
            id: TemplateId::generate(),
            label: self.label.mirrored(),
            raw_data: self.raw_data.clone(),
            normalized: self.normalized.iter().map(|x| -x).collect(),
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            bars_count: self.bars_count,
            is_augmented: true,
            augmentation_type: Some(AugmentationType::Mirror),
            parent_id: Some(self.id.clone()),
            quality_score: self.quality_score,
            envelope: None,
        }
    }

    /// Flat, display-oriented view without the data arrays.
    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id.clone(),
            label: self.label.clone(),
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            bars_count: self.bars_count,
            is_augmented: self.is_augmented,
            augmentation_type: self.augmentation_type,
            parent_id: self.parent_id.clone(),
            quality_score: self.quality_score,
        }
    }
}

/// Serializable template listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub label: Label,
    pub symbol: String,
    pub timeframe: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub bars_count: usize,
    pub is_augmented: bool,
    pub augmentation_type: Option<AugmentationType>,
    pub parent_id: Option<TemplateId>,
    pub quality_score: f64,
}
