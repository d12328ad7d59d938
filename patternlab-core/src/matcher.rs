//! KNN matcher: prune → exact-rank → vote → score → filter.
//!
//! Candidates are pruned by LB_Keogh against each template's envelope, the
//! survivors ranked by exact DTW distance, and the k nearest vote for their
//! labels with weight `1 / (d + ε)`. Each voted label is then scored by the
//! [`ConfidenceScorer`] and kept if it clears the threshold.

use tracing::debug;

use crate::confidence::{vote_weight, ConfidenceScorer};
use crate::config::EngineConfig;
use crate::distance::DistanceEngine;
use crate::domain::{Label, MatchResult, Neighbor, Template};
use crate::library::{PatternLibrary, TemplateView};

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_PRUNE_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatcher {
    engine: DistanceEngine,
    scorer: ConfidenceScorer,
    k: usize,
    use_lb_keogh: bool,
    prune_fraction: f64,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(DistanceEngine::default(), ConfidenceScorer::default())
    }
}

impl PatternMatcher {
    pub fn new(engine: DistanceEngine, scorer: ConfidenceScorer) -> Self {
        Self {
            engine,
            scorer,
            k: DEFAULT_K,
            use_lb_keogh: true,
            prune_fraction: DEFAULT_PRUNE_FRACTION,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            DistanceEngine::from_config(&config.dtw),
            ConfidenceScorer::from_config(&config.confidence),
        )
        .with_k(config.matcher.k)
        .with_lb_keogh(config.matcher.use_lb_keogh)
        .with_prune_fraction(config.matcher.prune_fraction)
    }

    /// Neighbors kept after ranking; clamped to at least one.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_lb_keogh(mut self, enabled: bool) -> Self {
        self.use_lb_keogh = enabled;
        self
    }

    pub fn with_prune_fraction(mut self, fraction: f64) -> Self {
        self.prune_fraction = fraction;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn engine(&self) -> &DistanceEngine {
        &self.engine
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    /// Match `query` against the live library, rebuilding a stale index first.
    ///
    /// The library's envelopes are built by its own [`DistanceEngine`] and
    /// bounded here with the matcher's, so both must use the same algorithm.
    /// Build the library and the matcher from one [`EngineConfig`].
    pub fn find_matches(
        &self,
        library: &mut PatternLibrary,
        query: &[f64],
        min_confidence: f64,
    ) -> Vec<MatchResult> {
        debug_assert_eq!(
            library.engine().algorithm(),
            self.engine.algorithm(),
            "library envelopes and matcher bounds use different DTW algorithms"
        );
        library.ensure_index();
        let snapshot = library.snapshot(|_| true);
        self.match_view(&snapshot.view(), query, min_confidence)
    }

    /// Match `query` against a read-only view. Results are sorted by
    /// confidence, highest first.
    pub fn match_view(
        &self,
        view: &TemplateView<'_>,
        query: &[f64],
        min_confidence: f64,
    ) -> Vec<MatchResult> {
        if query.is_empty() || view.is_empty() {
            return Vec::new();
        }

        let candidates = self.prune_candidates(view, query);
        let k_nearest = self.nearest_neighbors(&candidates, query);
        debug!(
            templates = view.len(),
            candidates = candidates.len(),
            neighbors = k_nearest.len(),
            "ranked query"
        );
        if k_nearest.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<MatchResult> = weighted_votes(&k_nearest)
            .into_iter()
            .filter_map(|(label, weight)| {
                let (confidence, breakdown) = self.scorer.score(&label, &k_nearest);
                if confidence < min_confidence {
                    return None;
                }
                // k_nearest is ascending, so the first hit is the closest.
                let best_match = k_nearest.iter().find(|n| n.label == label).cloned();
                Some(MatchResult {
                    label,
                    confidence,
                    nearest_neighbors: k_nearest.clone(),
                    vote_weight: weight,
                    best_match,
                    breakdown,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        matches
    }

    /// Keep the `max(1, floor(n * prune_fraction))` templates with the
    /// smallest LB_Keogh. Templates without an envelope rank with bound 0.
    pub fn prune_candidates<'v>(&self, view: &TemplateView<'v>, query: &[f64]) -> Vec<&'v Template> {
        if !self.use_lb_keogh {
            return view.iter().map(|e| e.template).collect();
        }
        let mut bounded: Vec<(&'v Template, f64)> = view
            .iter()
            .map(|e| {
                let lb = e
                    .envelope
                    .map_or(0.0, |env| self.engine.lb_keogh(query, env));
                (e.template, lb)
            })
            .collect();
        bounded.sort_by(|a, b| a.1.total_cmp(&b.1));
        let keep = ((bounded.len() as f64 * self.prune_fraction).floor() as usize).max(1);
        bounded.truncate(keep);
        bounded.into_iter().map(|(t, _)| t).collect()
    }

    /// The k candidates closest to `query`, ascending; non-finite distances
    /// are dropped. Ties keep candidate order.
    ///
    /// With early abandoning enabled, the current k-th best distance is
    /// passed to the engine as the abandon threshold once k neighbors are
    /// held. Abandoned candidates could not have entered the top k.
    pub fn nearest_neighbors(&self, candidates: &[&Template], query: &[f64]) -> Vec<Neighbor> {
        let mut best: Vec<Neighbor> = Vec::with_capacity(self.k + 1);
        for template in candidates {
            let threshold = if best.len() == self.k {
                best.last().map(|n| n.distance)
            } else {
                None
            };
            let distance = self
                .engine
                .distance_with_abandon(query, &template.normalized, threshold);
            if !distance.is_finite() {
                continue;
            }
            let at = best.partition_point(|n| n.distance <= distance);
            if at < self.k {
                best.insert(at, Neighbor::from_template(template, distance));
                best.truncate(self.k);
            }
        }
        best
    }
}

/// Per-label `Σ 1 / (d + ε)`, labels in order of first appearance.
fn weighted_votes(k_nearest: &[Neighbor]) -> Vec<(Label, f64)> {
    let mut votes: Vec<(Label, f64)> = Vec::new();
    for n in k_nearest {
        let w = vote_weight(n.distance);
        match votes.iter_mut().find(|(label, _)| *label == n.label) {
            Some((_, total)) => *total += w,
            None => votes.push((n.label.clone(), w)),
        }
    }
    votes
}
