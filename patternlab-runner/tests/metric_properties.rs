//! Property tests for fold splitting and classification metrics.

use proptest::prelude::*;

use patternlab_core::domain::{Label, NO_MATCH};
use patternlab_runner::folds::shuffled_k_fold;
use patternlab_runner::{ClassificationMetrics, ConfusionMatrix, Prediction};

fn label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("cup".to_string()),
        Just("flag".to_string()),
        Just("double_top".to_string()),
        Just(NO_MATCH.to_string()),
    ]
}

fn prediction_strategy() -> impl Strategy<Value = Prediction> {
    (
        prop_oneof![Just("cup"), Just("flag"), Just("double_top")],
        label_strategy(),
        0.0..=1.0f64,
    )
        .prop_map(|(truth, predicted, confidence)| {
            let confidence = if predicted == NO_MATCH { 0.0 } else { confidence };
            Prediction {
                true_label: Label::from(truth),
                predicted: Label::from(predicted),
                confidence,
            }
        })
}

proptest! {
    #[test]
    fn k_fold_tests_partition_the_samples(n in 2usize..60, folds in 2usize..12, seed in any::<u64>()) {
        prop_assume!(folds <= n);
        let specs = shuffled_k_fold(n, folds, seed).unwrap();
        prop_assert_eq!(specs.len(), folds);

        let mut seen: Vec<usize> = specs.iter().flat_map(|f| f.test.iter().copied()).collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());

        let sizes: Vec<usize> = specs.iter().map(|f| f.test.len()).collect();
        let max = sizes.iter().copied().max().unwrap();
        let min = sizes.iter().copied().min().unwrap();
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn metrics_stay_in_unit_range(predictions in prop::collection::vec(prediction_strategy(), 1..40)) {
        let m = ClassificationMetrics::compute(&predictions);
        for value in [m.accuracy, m.macro_precision, m.macro_recall, m.macro_f1, m.matched_rate, m.avg_confidence] {
            prop_assert!((0.0..=1.0).contains(&value), "value {}", value);
        }
        prop_assert_eq!(m.total_samples, predictions.len());
        prop_assert!(m.accuracy <= m.matched_rate + 1e-12);
    }

    #[test]
    fn confusion_matrix_counts_every_prediction(predictions in prop::collection::vec(prediction_strategy(), 0..40)) {
        let cm = ConfusionMatrix::from_predictions(&predictions);
        prop_assert_eq!(cm.total(), predictions.len());
        let diagonal: usize = cm.labels.iter().map(|l| cm.get(l.as_str(), l.as_str())).sum();
        let correct = predictions.iter().filter(|p| p.true_label == p.predicted).count();
        prop_assert_eq!(diagonal, correct);
    }
}
