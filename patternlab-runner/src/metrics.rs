//! Classification metrics — pure functions over (true, predicted, confidence)
//! triples.
//!
//! Macro averages follow the usual convention: per-label precision/recall/F1
//! over the union of true and predicted labels, an undefined ratio counts as
//! 0, and the macro value is the unweighted mean. Pairs predicted `NO_MATCH`
//! are excluded from the per-label metrics but count toward accuracy.

use std::collections::BTreeSet;

use patternlab_core::domain::{Label, NO_MATCH};
use serde::{Deserialize, Serialize};

/// One held-out template's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub true_label: Label,
    pub predicted: Label,
    /// 0.0 when nothing cleared the threshold.
    pub confidence: f64,
}

impl Prediction {
    pub fn is_match(&self) -> bool {
        self.predicted != NO_MATCH
    }

    pub fn is_correct(&self) -> bool {
        self.true_label == self.predicted
    }
}

/// Aggregate metrics for one evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub matched_rate: f64,
    pub avg_confidence: f64,
    pub total_samples: usize,
}

impl ClassificationMetrics {
    pub fn compute(predictions: &[Prediction]) -> Self {
        let matched: Vec<&Prediction> = predictions.iter().filter(|p| p.is_match()).collect();
        let (macro_precision, macro_recall, macro_f1) = macro_scores(&matched);
        Self {
            accuracy: accuracy(predictions),
            macro_precision,
            macro_recall,
            macro_f1,
            matched_rate: matched_rate(predictions),
            avg_confidence: avg_positive_confidence(predictions),
            total_samples: predictions.len(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Share of predictions equal to the true label (NO_MATCH counts as wrong).
pub fn accuracy(predictions: &[Prediction]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let correct = predictions.iter().filter(|p| p.is_correct()).count();
    correct as f64 / predictions.len() as f64
}

/// Share of predictions that are not NO_MATCH.
pub fn matched_rate(predictions: &[Prediction]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let matched = predictions.iter().filter(|p| p.is_match()).count();
    matched as f64 / predictions.len() as f64
}

/// Mean of the strictly positive confidences; 0.0 if there are none.
pub fn avg_positive_confidence(predictions: &[Prediction]) -> f64 {
    let positive: Vec<f64> = predictions
        .iter()
        .map(|p| p.confidence)
        .filter(|&c| c > 0.0)
        .collect();
    if positive.is_empty() {
        return 0.0;
    }
    positive.iter().sum::<f64>() / positive.len() as f64
}

/// Macro (precision, recall, F1). All zero when `pairs` is empty.
pub fn macro_scores(pairs: &[&Prediction]) -> (f64, f64, f64) {
    if pairs.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let labels: BTreeSet<&Label> = pairs
        .iter()
        .flat_map(|p| [&p.true_label, &p.predicted])
        .collect();

    let mut sum_p = 0.0;
    let mut sum_r = 0.0;
    let mut sum_f = 0.0;
    for label in &labels {
        let tp = pairs
            .iter()
            .filter(|p| &p.predicted == *label && &p.true_label == *label)
            .count() as f64;
        let predicted = pairs.iter().filter(|p| &p.predicted == *label).count() as f64;
        let actual = pairs.iter().filter(|p| &p.true_label == *label).count() as f64;

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, actual);
        let f1 = ratio(2.0 * precision * recall, precision + recall);
        sum_p += precision;
        sum_r += recall;
        sum_f += f1;
    }
    let n = labels.len() as f64;
    (sum_p / n, sum_r / n, sum_f / n)
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

// ─── Confusion matrix ────────────────────────────────────────────────

/// Counts indexed `[true][predicted]` over `labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sorted union of true and predicted labels, NO_MATCH included.
    pub labels: Vec<Label>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        let labels: Vec<Label> = predictions
            .iter()
            .flat_map(|p| [&p.true_label, &p.predicted])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for p in predictions {
            if let (Ok(row), Ok(col)) = (
                labels.binary_search(&p.true_label),
                labels.binary_search(&p.predicted),
            ) {
                counts[row][col] += 1;
            }
        }
        Self { labels, counts }
    }

    pub fn get(&self, true_label: &str, predicted: &str) -> usize {
        let row = self.labels.iter().position(|l| l == true_label);
        let col = self.labels.iter().position(|l| l == predicted);
        match (row, col) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}
