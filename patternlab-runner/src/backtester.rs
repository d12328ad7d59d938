//! Evaluator — cross-validation, confusion matrix, threshold sweep, and
//! sliding-window scans over a template library.
//!
//! Every evaluation works on an [`IndexSnapshot`] of the library and builds a
//! [`TemplateView`] per fold, so the library is only ever borrowed shared.
//! Held-out queries within a fold run in parallel; predictions are collected
//! in fold order.
//!
//! [`IndexSnapshot`]: patternlab_core::library::IndexSnapshot

use chrono::NaiveDateTime;
use patternlab_core::domain::{Bar, Label, Template, NO_MATCH};
use patternlab_core::library::TemplateView;
use patternlab_core::preprocess::{window_starts, Preprocessor};
use patternlab_core::{PatternLibrary, PatternMatcher};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EvaluationConfig;
use crate::folds::{leave_one_out, CvStrategy, FoldError};
use crate::metrics::{ClassificationMetrics, ConfusionMatrix, Prediction};

/// Errors from evaluation runs.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("need at least 2 templates for cross-validation, have {template_count}")]
    InsufficientTemplates { template_count: usize },

    #[error("fold split failed: {0}")]
    Fold(#[from] FoldError),
}

// ─── Result types ────────────────────────────────────────────────────

/// Outcome of one cross-validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    #[serde(flatten)]
    pub metrics: ClassificationMetrics,
    pub predictions: Vec<Prediction>,
    pub cv_strategy: String,
    pub template_count: usize,
    pub min_confidence: f64,
    /// Content hash of the library the run was taken on.
    pub library_fingerprint: Option<String>,
}

/// One row of a threshold sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub threshold: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub matched_rate: f64,
}

/// A match found by a sliding-window scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub start_index: usize,
    /// Exclusive.
    pub end_index: usize,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub label: Label,
    pub confidence: f64,
    pub window: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub windows_evaluated: usize,
    /// In scan order; within a window, highest confidence first.
    pub detections: Vec<Detection>,
}

// ─── Backtester ──────────────────────────────────────────────────────

/// Evaluates a matcher against the templates of a library.
#[derive(Debug, Clone)]
pub struct Backtester<'a> {
    library: &'a PatternLibrary,
    matcher: &'a PatternMatcher,
    config: EvaluationConfig,
}

impl<'a> Backtester<'a> {
    pub fn new(library: &'a PatternLibrary, matcher: &'a PatternMatcher) -> Self {
        Self {
            library,
            matcher,
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Cross-validate with the configured threshold, folds and filter.
    pub fn run_configured(&self) -> Result<CrossValidationReport, EvalError> {
        self.cross_validate(
            self.config.min_confidence,
            self.config.folds,
            self.config.exclude_augmented,
        )
    }

    /// Hold out each fold's templates, match them against the rest, and
    /// score the top candidate against `min_confidence`.
    pub fn cross_validate(
        &self,
        min_confidence: f64,
        folds: usize,
        exclude_augmented: bool,
    ) -> Result<CrossValidationReport, EvalError> {
        let snapshot = self.library.snapshot(|t| eligible(t, exclude_augmented));
        let n = snapshot.len();
        if n < 2 {
            return Err(EvalError::InsufficientTemplates { template_count: n });
        }

        let strategy = CvStrategy::choose(n, folds, self.config.seed);
        let specs = strategy.split(n)?;
        let mut predictions = Vec::with_capacity(n);
        for spec in &specs {
            let view = snapshot.view_of(&spec.train);
            let fold: Vec<Prediction> = spec
                .test
                .par_iter()
                .filter_map(|&i| snapshot.get(i))
                .map(|held_out| self.predict(&view, held_out, min_confidence))
                .collect();
            debug!(fold = spec.fold_index, train = view.len(), test = fold.len(), "fold evaluated");
            predictions.extend(fold);
        }

        let metrics = ClassificationMetrics::compute(&predictions);
        info!(
            strategy = %strategy.name(),
            templates = n,
            min_confidence,
            accuracy = metrics.accuracy,
            matched_rate = metrics.matched_rate,
            "cross-validation complete"
        );
        Ok(CrossValidationReport {
            metrics,
            predictions,
            cv_strategy: strategy.name(),
            template_count: n,
            min_confidence,
            library_fingerprint: self.library.fingerprint().ok(),
        })
    }

    /// Leave-one-out predictions tabulated by true and predicted label.
    pub fn confusion_matrix(&self, min_confidence: f64, exclude_augmented: bool) -> ConfusionMatrix {
        let snapshot = self.library.snapshot(|t| eligible(t, exclude_augmented));
        let predictions: Vec<Prediction> = leave_one_out(snapshot.len())
            .par_iter()
            .filter_map(|spec| {
                let held_out = snapshot.get(spec.test[0])?;
                let view = snapshot.view_of(&spec.train);
                Some(self.predict(&view, held_out, min_confidence))
            })
            .collect();
        ConfusionMatrix::from_predictions(&predictions)
    }

    /// Cross-validate once per threshold with the configured folds.
    /// Thresholds whose run fails are left out.
    pub fn threshold_sweep(&self, thresholds: &[f64], exclude_augmented: bool) -> Vec<ThresholdRow> {
        thresholds
            .iter()
            .filter_map(|&threshold| {
                match self.cross_validate(threshold, self.config.folds, exclude_augmented) {
                    Ok(report) => Some(ThresholdRow {
                        threshold,
                        accuracy: report.metrics.accuracy,
                        precision: report.metrics.macro_precision,
                        recall: report.metrics.macro_recall,
                        f1: report.metrics.macro_f1,
                        matched_rate: report.metrics.matched_rate,
                    }),
                    Err(e) => {
                        debug!(threshold, error = %e, "threshold skipped");
                        None
                    }
                }
            })
            .collect()
    }

    /// Slide a `window_size` window over `series` every `step` bars and
    /// report every match at or above `min_confidence`.
    ///
    /// Windows are normalized with a default [`Preprocessor`], regardless of
    /// how the library's templates were built.
    pub fn scan(
        &self,
        series: &[Bar],
        window_size: usize,
        step: usize,
        min_confidence: f64,
    ) -> ScanReport {
        let preprocessor = Preprocessor::default();
        let snapshot = self.library.snapshot(|_| true);
        let view = snapshot.view();
        let starts: Vec<usize> = window_starts(series.len(), window_size, step).collect();

        let detections: Vec<Detection> = starts
            .par_iter()
            .map(|&start| {
                let window = &series[start..start + window_size];
                self.scan_window(&view, &preprocessor, window, start, min_confidence)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        info!(
            windows = starts.len(),
            detections = detections.len(),
            window_size,
            step,
            "scan complete"
        );
        ScanReport {
            windows_evaluated: starts.len(),
            detections,
        }
    }

    fn scan_window(
        &self,
        view: &TemplateView<'_>,
        preprocessor: &Preprocessor,
        window: &[Bar],
        start: usize,
        min_confidence: f64,
    ) -> Vec<Detection> {
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return Vec::new();
        };
        let query = preprocessor.normalize_pattern(window);
        self.matcher
            .match_view(view, &query, min_confidence)
            .into_iter()
            .map(|m| Detection {
                start_index: start,
                end_index: start + window.len(),
                start_time: first.timestamp,
                end_time: last.timestamp,
                label: m.label,
                confidence: m.confidence,
                window: window.to_vec(),
            })
            .collect()
    }

    fn predict(&self, view: &TemplateView<'_>, held_out: &Template, min_confidence: f64) -> Prediction {
        let matches = self.matcher.match_view(view, &held_out.normalized, 0.0);
        let (predicted, confidence) = match matches.into_iter().next() {
            Some(top) if top.confidence >= min_confidence => (top.label, top.confidence),
            _ => (Label::from(NO_MATCH), 0.0),
        };
        Prediction {
            true_label: held_out.label.clone(),
            predicted,
            confidence,
        }
    }
}

fn eligible(template: &Template, exclude_augmented: bool) -> bool {
    !(exclude_augmented && template.is_augmented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use patternlab_core::domain::TemplateMetadata;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let t0 = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: t0 + chrono::Duration::hours(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 0.0,
            })
            .collect()
    }

    fn wave(n: usize, freq: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 5.0 * (i as f64 * freq).sin()).collect()
    }

    #[test]
    fn single_template_is_insufficient() {
        let mut lib = PatternLibrary::default();
        lib.add_pattern("A", &bars(&wave(20, 0.3)), TemplateMetadata::default())
            .unwrap();
        let matcher = PatternMatcher::default();
        let err = Backtester::new(&lib, &matcher)
            .cross_validate(0.7, 5, true)
            .unwrap_err();
        assert!(matches!(err, EvalError::InsufficientTemplates { template_count: 1 }));
    }

    #[test]
    fn augmented_templates_are_excluded_by_default() {
        let mut lib = PatternLibrary::default();
        lib.add_pattern("bullish_a", &bars(&wave(20, 0.3)), TemplateMetadata::default())
            .unwrap();
        lib.augment(true);
        let matcher = PatternMatcher::default();
        let bt = Backtester::new(&lib, &matcher);
        assert!(bt.cross_validate(0.0, 5, true).is_err());
        let report = bt.cross_validate(0.0, 5, false).unwrap();
        assert_eq!(report.template_count, 2);
    }

    #[test]
    fn evaluation_does_not_touch_the_library() {
        let mut lib = PatternLibrary::default();
        for f in [0.2, 0.25, 0.6, 0.65] {
            let label = if f < 0.5 { "slow" } else { "fast" };
            lib.add_pattern(label, &bars(&wave(24, f)), TemplateMetadata::default())
                .unwrap();
        }
        let before = lib.fingerprint().unwrap();
        let matcher = PatternMatcher::default();
        let bt = Backtester::new(&lib, &matcher);
        let report = bt.cross_validate(0.0, 5, true).unwrap();
        assert_eq!(report.cv_strategy, "Leave-One-Out");
        assert_eq!(report.predictions.len(), 4);
        assert_eq!(report.library_fingerprint.as_deref(), Some(before.as_str()));
        assert!(lib.is_index_dirty());
        assert_eq!(lib.fingerprint().unwrap(), before);
    }

    #[test]
    fn sweep_skips_failing_thresholds() {
        let lib = PatternLibrary::default();
        let matcher = PatternMatcher::default();
        assert!(Backtester::new(&lib, &matcher)
            .threshold_sweep(&[0.5, 0.9], true)
            .is_empty());
    }

    #[test]
    fn scan_reports_positions() {
        let mut lib = PatternLibrary::default();
        lib.add_pattern("wave", &bars(&wave(10, 0.5)), TemplateMetadata::default())
            .unwrap();
        let matcher = PatternMatcher::default();
        let series = bars(&wave(30, 0.5));
        let report = Backtester::new(&lib, &matcher).scan(&series, 10, 10, 0.0);
        assert_eq!(report.windows_evaluated, 3);
        assert_eq!(report.detections.len(), 3);
        let d = &report.detections[1];
        assert_eq!((d.start_index, d.end_index), (10, 20));
        assert_eq!(d.start_time, series[10].timestamp);
        assert_eq!(d.end_time, series[19].timestamp);
        assert_eq!(d.window.len(), 10);
        assert_eq!(d.label, "wave");
    }
}
