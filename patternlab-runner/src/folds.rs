//! Cross-validation fold splitting.
//!
//! Small template sets (≤ 10) use leave-one-out; larger ones use a shuffled,
//! seeded k-fold split. Fold specs are plain index lists into the eligible
//! template set, so the evaluator can build a read-only view per fold.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest template count validated with leave-one-out.
pub const LOO_MAX_TEMPLATES: usize = 10;

/// Which splitter a cross-validation run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CvStrategy {
    LeaveOneOut,
    /// `folds` is the requested count; the split uses `min(folds, n)`.
    KFold { folds: usize, seed: u64 },
}

impl CvStrategy {
    /// Leave-one-out up to [`LOO_MAX_TEMPLATES`], shuffled k-fold beyond.
    pub fn choose(template_count: usize, folds: usize, seed: u64) -> Self {
        if template_count <= LOO_MAX_TEMPLATES {
            CvStrategy::LeaveOneOut
        } else {
            CvStrategy::KFold { folds, seed }
        }
    }

    /// Display name: `Leave-One-Out` or `{folds}-Fold`.
    pub fn name(&self) -> String {
        match self {
            CvStrategy::LeaveOneOut => "Leave-One-Out".to_string(),
            CvStrategy::KFold { folds, .. } => format!("{folds}-Fold"),
        }
    }

    pub fn split(&self, n: usize) -> Result<Vec<FoldSpec>, FoldError> {
        match *self {
            CvStrategy::LeaveOneOut => Ok(leave_one_out(n)),
            CvStrategy::KFold { folds, seed } => shuffled_k_fold(n, folds.min(n), seed),
        }
    }
}

/// Train/test positions of one fold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSpec {
    pub fold_index: usize,
    /// Ascending.
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FoldError {
    #[error("cannot split {n} samples into {folds} folds (need 2 <= folds <= samples)")]
    InvalidFoldCount { n: usize, folds: usize },
}

/// One fold per sample, each holding out exactly that sample.
pub fn leave_one_out(n: usize) -> Vec<FoldSpec> {
    (0..n)
        .map(|i| FoldSpec {
            fold_index: i,
            train: (0..n).filter(|&j| j != i).collect(),
            test: vec![i],
        })
        .collect()
}

/// Shuffle `0..n` with `seed`, then cut it into `folds` consecutive test
/// chunks. The first `n % folds` chunks get one extra sample.
pub fn shuffled_k_fold(n: usize, folds: usize, seed: u64) -> Result<Vec<FoldSpec>, FoldError> {
    if folds < 2 || folds > n {
        return Err(FoldError::InvalidFoldCount { n, folds });
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let base = n / folds;
    let extra = n % folds;
    let mut specs = Vec::with_capacity(folds);
    let mut start = 0;
    for fold_index in 0..folds {
        let size = base + usize::from(fold_index < extra);
        let test = order[start..start + size].to_vec();
        let mut in_test = vec![false; n];
        for &i in &test {
            in_test[i] = true;
        }
        let train = (0..n).filter(|&i| !in_test[i]).collect();
        specs.push(FoldSpec {
            fold_index,
            train,
            test,
        });
        start += size;
    }
    Ok(specs)
}
