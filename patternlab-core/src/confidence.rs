//! Confidence scoring for a voted label.
//!
//! Four signals, each in [0, 1], combined by a weighted sum:
//! - closeness: inverse distance to the nearest same-label neighbor
//! - consensus: share of the k neighbors carrying the label
//! - separation: vote-weight gap between the best and second-best label
//! - quality: mean quality score of same-label neighbors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ConfidenceConfig;
use crate::domain::{ConfidenceBreakdown, Label, Neighbor};

/// Added to distances before inversion and to weights before division.
pub const SCORE_EPSILON: f64 = 1e-6;

/// Closeness saturates at 1.0 once `1 / (d + ε)` reaches this value.
const CLOSENESS_SCALE: f64 = 10.0;

/// Vote weight of one neighbor: `1 / (distance + ε)`.
#[inline]
pub fn vote_weight(distance: f64) -> f64 {
    1.0 / (distance + SCORE_EPSILON)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub closeness: f64,
    pub consensus: f64,
    pub separation: f64,
    pub quality: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self::from(&ConfidenceConfig::default())
    }
}

impl From<&ConfidenceConfig> for ConfidenceWeights {
    fn from(config: &ConfidenceConfig) -> Self {
        Self {
            closeness: config.closeness,
            consensus: config.consensus,
            separation: config.separation,
            quality: config.quality,
        }
    }
}

impl ConfidenceWeights {
    pub fn total(&self) -> f64 {
        self.closeness + self.consensus + self.separation + self.quality
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
}

impl ConfidenceScorer {
    /// Weights are used as given; a sum other than 1 only logs a warning.
    pub fn new(weights: ConfidenceWeights) -> Self {
        let total = weights.total();
        if (total - 1.0).abs() > 1e-6 {
            warn!(total, "confidence weights do not sum to 1; scores are clamped to [0, 1]");
        }
        Self { weights }
    }

    pub fn from_config(config: &ConfidenceConfig) -> Self {
        Self::new(ConfidenceWeights::from(config))
    }

    pub fn weights(&self) -> ConfidenceWeights {
        self.weights
    }

    /// Confidence in `label` given the k-nearest list (ascending distance).
    pub fn confidence(&self, label: &Label, k_nearest: &[Neighbor]) -> f64 {
        self.score(label, k_nearest).0
    }

    /// Confidence together with the individual signals.
    pub fn score(&self, label: &Label, k_nearest: &[Neighbor]) -> (f64, ConfidenceBreakdown) {
        let breakdown = breakdown(label, k_nearest);
        let w = &self.weights;
        let raw = w.closeness * breakdown.closeness
            + w.consensus * breakdown.consensus
            + w.separation * breakdown.separation
            + w.quality * breakdown.quality;
        (raw.clamp(0.0, 1.0), breakdown)
    }
}

fn breakdown(label: &Label, k_nearest: &[Neighbor]) -> ConfidenceBreakdown {
    let same: Vec<&Neighbor> = k_nearest.iter().filter(|n| &n.label == label).collect();

    let closeness = same
        .iter()
        .map(|n| n.distance)
        .fold(f64::INFINITY, f64::min);
    let closeness = (vote_weight(closeness) / CLOSENESS_SCALE).min(1.0);

    let consensus = if k_nearest.is_empty() {
        0.0
    } else {
        same.len() as f64 / k_nearest.len() as f64
    };

    let quality = if same.is_empty() {
        0.0
    } else {
        same.iter().map(|n| n.quality_score).sum::<f64>() / same.len() as f64
    };

    ConfidenceBreakdown {
        closeness,
        consensus,
        separation: separation(k_nearest),
        quality,
    }
}

/// `(W1 - W2) / (W1 + ε)` over per-label total weights; 1.0 when at most
/// one distinct label is present. Equal weights order by label.
fn separation(k_nearest: &[Neighbor]) -> f64 {
    let mut totals: BTreeMap<&Label, f64> = BTreeMap::new();
    for n in k_nearest {
        *totals.entry(&n.label).or_insert(0.0) += vote_weight(n.distance);
    }
    if totals.len() <= 1 {
        return 1.0;
    }
    let mut ranked: Vec<(&Label, f64)> = totals.into_iter().collect();
    // Stable sort over label-ordered input keeps ties in label order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let best = ranked[0].1;
    let second = ranked[1].1;
    (best - second) / (best + SCORE_EPSILON)
}
