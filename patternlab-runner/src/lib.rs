//! PatternLab Runner — evaluation, price loading, reports.
//!
//! This crate builds on `patternlab-core` to provide:
//! - Cross-validation (leave-one-out or seeded k-fold) over read-only views
//! - Confusion matrices and confidence-threshold sweeps
//! - Sliding-window scans of price series
//! - Classification metrics
//! - CSV price loading and JSON/CSV/Markdown export

pub mod backtester;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod folds;
pub mod metrics;

pub use backtester::{
    Backtester, CrossValidationReport, Detection, EvalError, ScanReport, ThresholdRow,
};
pub use config::{ConfigError, EvaluationConfig, RunnerConfig};
pub use data_loader::{load_csv, parse_csv, LoadError, LoadedSeries};
pub use folds::{CvStrategy, FoldError, FoldSpec};
pub use metrics::{ClassificationMetrics, ConfusionMatrix, Prediction};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn reports_are_send_sync() {
        assert_send::<CrossValidationReport>();
        assert_sync::<CrossValidationReport>();
        assert_send::<ScanReport>();
        assert_sync::<ScanReport>();
        assert_send::<ConfusionMatrix>();
        assert_sync::<ConfusionMatrix>();
    }

    #[test]
    fn backtester_is_sync() {
        assert_send::<Backtester<'static>>();
        assert_sync::<Backtester<'static>>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<EvaluationConfig>();
        assert_sync::<EvaluationConfig>();
        assert_send::<RunnerConfig>();
        assert_sync::<RunnerConfig>();
    }
}
