//! Match results produced by the matcher for a single query.

use serde::{Deserialize, Serialize};

use super::{Label, Template, TemplateId};

/// One of the k nearest templates for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub template_id: TemplateId,
    pub label: Label,
    pub quality_score: f64,
    pub distance: f64,
}

impl Neighbor {
    pub fn from_template(template: &Template, distance: f64) -> Self {
        Self {
            template_id: template.id.clone(),
            label: template.label.clone(),
            quality_score: template.quality_score,
            distance,
        }
    }
}

/// The four signals the confidence score is built from, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub closeness: f64,
    pub consensus: f64,
    pub separation: f64,
    pub quality: f64,
}

/// Result of matching a query against the library for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub label: Label,
    pub confidence: f64,
    /// The full k-nearest list the vote was taken over, ascending distance.
    pub nearest_neighbors: Vec<Neighbor>,
    pub vote_weight: f64,
    /// Lowest-distance neighbor carrying `label`.
    pub best_match: Option<Neighbor>,
    pub breakdown: ConfidenceBreakdown,
}

impl MatchResult {
    pub fn summary(&self) -> MatchSummary {
        let avg_distance = if self.nearest_neighbors.is_empty() {
            0.0
        } else {
            self.nearest_neighbors.iter().map(|n| n.distance).sum::<f64>()
                / self.nearest_neighbors.len() as f64
        };
        MatchSummary {
            label: self.label.clone(),
            confidence: self.confidence,
            k_neighbors: self.nearest_neighbors.len(),
            avg_distance,
            best_template: self.best_match.as_ref().map(|n| n.template_id.clone()),
        }
    }
}

/// Compact, display-oriented view of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub label: Label,
    pub confidence: f64,
    pub k_neighbors: usize,
    pub avg_distance: f64,
    pub best_template: Option<TemplateId>,
}
