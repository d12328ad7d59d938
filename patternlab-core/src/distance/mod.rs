//! Distance engine — elastic DTW distance and LB_Keogh pruning bounds.
//!
//! The algorithm is a closed set of {derivative, standard} × {Sakoe–Chiba,
//! amercing (ADTW), unconstrained}, resolved once from configuration strings.
//! Unknown strings fall back to the unconstrained variant instead of failing.
//!
//! `distance` divides the raw accumulated cost by `len(query) + len(candidate)`
//! (the input lengths, before any derivative transform). This is a
//! path-length-independent scale, not the length of the warping path.

pub mod dtw;
pub mod envelope;

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::DtwConfig;
use crate::domain::Envelope;

pub use dtw::{accumulated_cost, band_radius, slope_estimate};
pub use envelope::{compute_envelopes, lb_keogh};

/// DTW variant × constraint, each carrying its own parameters.
///
/// `window` values are fractions of sequence length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DtwAlgorithm {
    DerivativeSakoeChiba { window: f64 },
    DerivativeAmercing { window: f64, penalty: f64 },
    Derivative,
    StandardSakoeChiba { window: f64 },
    StandardAmercing { window: f64, penalty: f64 },
    Standard,
}

impl Default for DtwAlgorithm {
    fn default() -> Self {
        DtwAlgorithm::DerivativeSakoeChiba { window: 0.15 }
    }
}

impl DtwAlgorithm {
    /// Resolve the configured variant/constraint strings.
    ///
    /// - variant `"derivative"` selects derivative DTW, anything else standard;
    /// - constraint `"sakoe_chiba"` / `"adtw"` select the banded forms, `"none"`
    ///   the unconstrained one; any other string falls back to unconstrained.
    pub fn resolve(config: &DtwConfig) -> Self {
        let derivative = match config.variant.as_str() {
            "derivative" => true,
            "standard" => false,
            other => {
                warn!(variant = other, "unknown DTW variant, using standard");
                false
            }
        };
        let window = config.sakoe_chiba_window;
        let amercing_window = config.amercing_penalty;
        let penalty = config.warp_penalty;
        match (derivative, config.constraint.as_str()) {
            (true, "sakoe_chiba") => DtwAlgorithm::DerivativeSakoeChiba { window },
            (true, "adtw") => DtwAlgorithm::DerivativeAmercing {
                window: amercing_window,
                penalty,
            },
            (false, "sakoe_chiba") => DtwAlgorithm::StandardSakoeChiba { window },
            (false, "adtw") => DtwAlgorithm::StandardAmercing {
                window: amercing_window,
                penalty,
            },
            (true, constraint) => {
                if constraint != "none" {
                    warn!(constraint, "unknown DTW constraint, using unconstrained derivative DTW");
                }
                DtwAlgorithm::Derivative
            }
            (false, constraint) => {
                if constraint != "none" {
                    warn!(constraint, "unknown DTW constraint, using unconstrained DTW");
                }
                DtwAlgorithm::Standard
            }
        }
    }

    pub fn is_derivative(&self) -> bool {
        matches!(
            self,
            DtwAlgorithm::DerivativeSakoeChiba { .. }
                | DtwAlgorithm::DerivativeAmercing { .. }
                | DtwAlgorithm::Derivative
        )
    }

    /// Band width as a fraction of sequence length; `None` when unconstrained.
    pub fn band_fraction(&self) -> Option<f64> {
        match *self {
            DtwAlgorithm::DerivativeSakoeChiba { window }
            | DtwAlgorithm::StandardSakoeChiba { window }
            | DtwAlgorithm::DerivativeAmercing { window, .. }
            | DtwAlgorithm::StandardAmercing { window, .. } => Some(window),
            DtwAlgorithm::Derivative | DtwAlgorithm::Standard => None,
        }
    }

    /// Cost added to every non-diagonal step.
    pub fn warp_penalty(&self) -> f64 {
        match *self {
            DtwAlgorithm::DerivativeAmercing { penalty, .. }
            | DtwAlgorithm::StandardAmercing { penalty, .. } => penalty,
            _ => 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DtwAlgorithm::DerivativeSakoeChiba { .. } => "ddtw/sakoe_chiba",
            DtwAlgorithm::DerivativeAmercing { .. } => "ddtw/adtw",
            DtwAlgorithm::Derivative => "ddtw",
            DtwAlgorithm::StandardSakoeChiba { .. } => "dtw/sakoe_chiba",
            DtwAlgorithm::StandardAmercing { .. } => "dtw/adtw",
            DtwAlgorithm::Standard => "dtw",
        }
    }
}

/// Computes DTW distances and the envelopes used to prune candidates.
///
/// Envelopes and bounds live in the algorithm's comparison space: for
/// derivative variants both the template and the query pass through the
/// slope estimate first, so the bound applies to the same series the DP
/// compares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEngine {
    algorithm: DtwAlgorithm,
    early_abandon: bool,
}

impl Default for DistanceEngine {
    fn default() -> Self {
        Self::new(DtwAlgorithm::default())
    }
}

impl DistanceEngine {
    pub fn new(algorithm: DtwAlgorithm) -> Self {
        Self {
            algorithm,
            early_abandon: true,
        }
    }

    pub fn from_config(config: &DtwConfig) -> Self {
        Self {
            algorithm: DtwAlgorithm::resolve(config),
            early_abandon: config.use_early_abandon,
        }
    }

    pub fn algorithm(&self) -> DtwAlgorithm {
        self.algorithm
    }

    /// Whether callers should pass abandon thresholds (advisory).
    pub fn early_abandon(&self) -> bool {
        self.early_abandon
    }

    /// Envelope width used when the index is built without an explicit one:
    /// the algorithm's band, or the whole series when unconstrained.
    pub fn default_envelope_fraction(&self) -> f64 {
        self.algorithm.band_fraction().unwrap_or(1.0)
    }

    /// The series the DP actually compares.
    pub fn comparison_signal<'a>(&self, signal: &'a [f64]) -> Cow<'a, [f64]> {
        if self.algorithm.is_derivative() {
            Cow::Owned(slope_estimate(signal))
        } else {
            Cow::Borrowed(signal)
        }
    }

    /// Raw accumulated cost under the configured algorithm.
    pub fn raw_cost(&self, query: &[f64], candidate: &[f64]) -> f64 {
        self.cost_with_limit(query, candidate, None)
    }

    fn cost_with_limit(&self, query: &[f64], candidate: &[f64], limit: Option<f64>) -> f64 {
        let x = self.comparison_signal(query);
        let y = self.comparison_signal(candidate);
        let radius = self
            .algorithm
            .band_fraction()
            .map(|f| band_radius(f, x.len().max(y.len())));
        accumulated_cost(&x, &y, radius, self.algorithm.warp_penalty(), limit)
    }

    /// Normalized DTW distance: raw cost / (`len(query) + len(candidate)`).
    pub fn distance(&self, query: &[f64], candidate: &[f64]) -> f64 {
        self.distance_with_abandon(query, candidate, None)
    }

    /// As [`distance`](Self::distance), but may return `f64::INFINITY` early
    /// once the result is certain to exceed `threshold` (normalized scale).
    /// The threshold is advisory: a finite result is always exact.
    pub fn distance_with_abandon(
        &self,
        query: &[f64],
        candidate: &[f64],
        threshold: Option<f64>,
    ) -> f64 {
        let path_scale = (query.len() + candidate.len()) as f64;
        if path_scale == 0.0 {
            return f64::INFINITY;
        }
        let limit = threshold
            .filter(|_| self.early_abandon)
            .map(|t| t * path_scale);
        self.cost_with_limit(query, candidate, limit) / path_scale
    }

    /// Upper/lower envelope of a template's comparison signal.
    ///
    /// `window_fraction` defaults to [`default_envelope_fraction`].
    ///
    /// [`default_envelope_fraction`]: Self::default_envelope_fraction
    pub fn envelopes(&self, template: &[f64], window_fraction: Option<f64>) -> Envelope {
        let fraction = window_fraction.unwrap_or_else(|| self.default_envelope_fraction());
        compute_envelopes(&self.comparison_signal(template), fraction)
    }

    /// LB_Keogh of `query` against a template envelope built by
    /// [`envelopes`](Self::envelopes). Euclidean scale: never exceeds
    /// `sqrt(raw_cost)` for equal-length signals when the envelope width is at
    /// least the band width.
    pub fn lb_keogh(&self, query: &[f64], envelope: &Envelope) -> f64 {
        lb_keogh(&self.comparison_signal(query), &envelope.upper, &envelope.lower)
    }

    /// LB_Keogh moved onto the `distance` scale: `lb² / (len(query) + template_len)`.
    /// Never exceeds `distance(query, template)` under the same conditions.
    pub fn lb_keogh_normalized(&self, query: &[f64], envelope: &Envelope, template_len: usize) -> f64 {
        let lb = self.lb_keogh(query, envelope);
        let path_scale = (query.len() + template_len) as f64;
        if path_scale == 0.0 {
            return 0.0;
        }
        lb * lb / path_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(variant: &str, constraint: &str) -> DtwConfig {
        DtwConfig {
            variant: variant.into(),
            constraint: constraint.into(),
            ..DtwConfig::default()
        }
    }

    #[test]
    fn resolves_every_known_combination() {
        assert_eq!(
            DtwAlgorithm::resolve(&config("derivative", "sakoe_chiba")),
            DtwAlgorithm::DerivativeSakoeChiba { window: 0.15 }
        );
        assert_eq!(
            DtwAlgorithm::resolve(&config("derivative", "adtw")),
            DtwAlgorithm::DerivativeAmercing { window: 0.5, penalty: 1.0 }
        );
        assert_eq!(DtwAlgorithm::resolve(&config("derivative", "none")), DtwAlgorithm::Derivative);
        assert_eq!(
            DtwAlgorithm::resolve(&config("standard", "sakoe_chiba")),
            DtwAlgorithm::StandardSakoeChiba { window: 0.15 }
        );
        assert_eq!(
            DtwAlgorithm::resolve(&config("standard", "adtw")),
            DtwAlgorithm::StandardAmercing { window: 0.5, penalty: 1.0 }
        );
        assert_eq!(DtwAlgorithm::resolve(&config("standard", "none")), DtwAlgorithm::Standard);
    }

    #[test]
    fn unknown_strings_fall_back_to_unconstrained() {
        assert_eq!(
            DtwAlgorithm::resolve(&config("derivative", "itakura")),
            DtwAlgorithm::Derivative
        );
        assert_eq!(DtwAlgorithm::resolve(&config("shapelet", "itakura")), DtwAlgorithm::Standard);
        assert_eq!(
            DtwAlgorithm::resolve(&config("weird", "sakoe_chiba")),
            DtwAlgorithm::StandardSakoeChiba { window: 0.15 }
        );
    }

    #[test]
    fn distance_is_normalized_by_input_lengths() {
        let engine = DistanceEngine::new(DtwAlgorithm::Standard);
        let a = [0.0, 0.0];
        let b = [1.0, 1.0];
        // raw cost 2 (diagonal), divided by 2 + 2
        assert_eq!(engine.distance(&a, &b), 0.5);
    }

    #[test]
    fn self_distance_is_zero_for_all_variants() {
        let s = [0.2, -1.0, 0.7, 1.4, -0.3, 0.0, 0.9];
        for algo in [
            DtwAlgorithm::DerivativeSakoeChiba { window: 0.15 },
            DtwAlgorithm::DerivativeAmercing { window: 0.5, penalty: 1.0 },
            DtwAlgorithm::Derivative,
            DtwAlgorithm::StandardSakoeChiba { window: 0.15 },
            DtwAlgorithm::StandardAmercing { window: 0.5, penalty: 1.0 },
            DtwAlgorithm::Standard,
        ] {
            assert_eq!(DistanceEngine::new(algo).distance(&s, &s), 0.0, "{}", algo.name());
        }
    }

    #[test]
    fn envelope_defaults_to_band_width() {
        let banded = DistanceEngine::new(DtwAlgorithm::StandardSakoeChiba { window: 0.2 });
        assert_eq!(banded.default_envelope_fraction(), 0.2);
        let free = DistanceEngine::new(DtwAlgorithm::Standard);
        assert_eq!(free.default_envelope_fraction(), 1.0);
    }

    #[test]
    fn derivative_envelope_is_over_slope_signal() {
        let engine = DistanceEngine::new(DtwAlgorithm::Derivative);
        let env = engine.envelopes(&[0.0, 1.0, 2.0, 3.0, 4.0], None);
        assert_eq!(env.len(), 3);
        assert!(env.upper.iter().all(|&u| (u - 1.0).abs() < 1e-12));
    }

    #[test]
    fn abandon_threshold_is_ignored_when_disabled() {
        let mut cfg = config("standard", "none");
        cfg.use_early_abandon = false;
        let engine = DistanceEngine::from_config(&cfg);
        let d = engine.distance_with_abandon(&[0.0, 0.0], &[5.0, 5.0], Some(0.01));
        assert!(d.is_finite());
    }

    #[test]
    fn lower_bound_below_distance_for_shifted_bump() {
        let engine = DistanceEngine::new(DtwAlgorithm::StandardSakoeChiba { window: 0.2 });
        let template = [0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let query = [0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0, 0.0];
        let env = engine.envelopes(&template, None);
        let lb = engine.lb_keogh_normalized(&query, &env, template.len());
        let d = engine.distance(&query, &template);
        assert!(lb <= d + 1e-12, "lb {lb} > d {d}");
        assert!(engine.lb_keogh(&query, &env) <= engine.raw_cost(&query, &template).sqrt() + 1e-12);
    }
}
