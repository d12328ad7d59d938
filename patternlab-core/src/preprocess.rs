//! Feature extraction — OHLCV window to a single comparable signal.
//!
//! Steps: close prices → optional first difference → normalization.
//! The derivative removes price level so patterns at different price scales
//! compare by shape.

use serde::{Deserialize, Serialize};

use crate::domain::{closes, validate_window, Bar, WindowError};

/// Guards division for constant series; result becomes all zeros.
pub const NORMALIZATION_EPSILON: f64 = 1e-8;

/// Normalization applied after the optional derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// `(x - mean) / (std + ε)`, population standard deviation.
    #[default]
    #[serde(alias = "z_score")]
    Zscore,
    /// `(x - min) / (max - min + ε)`.
    #[serde(alias = "min_max")]
    Minmax,
    /// Identity.
    None,
}

impl Normalization {
    pub fn apply(self, data: &[f64]) -> Vec<f64> {
        if data.is_empty() {
            return Vec::new();
        }
        match self {
            Normalization::Zscore => {
                let n = data.len() as f64;
                let mean = data.iter().sum::<f64>() / n;
                let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                data.iter()
                    .map(|x| (x - mean) / (std + NORMALIZATION_EPSILON))
                    .collect()
            }
            Normalization::Minmax => {
                let min = data.iter().copied().fold(f64::INFINITY, f64::min);
                let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                data.iter()
                    .map(|x| (x - min) / (max - min + NORMALIZATION_EPSILON))
                    .collect()
            }
            Normalization::None => data.to_vec(),
        }
    }
}

/// Turns raw OHLCV windows into normalized signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    normalization: Normalization,
    use_derivative: bool,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(Normalization::default())
    }
}

impl Preprocessor {
    /// Extractor with the given normalization; first differences enabled.
    pub fn new(normalization: Normalization) -> Self {
        Self {
            normalization,
            use_derivative: true,
        }
    }

    pub fn with_derivative(mut self, use_derivative: bool) -> Self {
        self.use_derivative = use_derivative;
        self
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn uses_derivative(&self) -> bool {
        self.use_derivative
    }

    /// Minimum window length that yields a non-empty signal.
    pub fn min_bars(&self) -> usize {
        if self.use_derivative {
            2
        } else {
            1
        }
    }

    /// Normalize a window with an explicit derivative choice.
    ///
    /// A one-bar window with `use_derivative` yields an empty signal; callers
    /// are expected to reject such windows first (see [`checked_normalize`]).
    ///
    /// [`checked_normalize`]: Preprocessor::checked_normalize
    pub fn normalize(&self, window: &[Bar], use_derivative: bool) -> Vec<f64> {
        let prices = closes(window);
        if use_derivative {
            self.normalization.apply(&first_difference(&prices))
        } else {
            self.normalization.apply(&prices)
        }
    }

    /// Normalize with the extractor's configured derivative setting.
    pub fn normalize_pattern(&self, window: &[Bar]) -> Vec<f64> {
        self.normalize(window, self.use_derivative)
    }

    /// Validate the window against the collaborator contract, then normalize.
    pub fn checked_normalize(&self, window: &[Bar]) -> Result<Vec<f64>, WindowError> {
        validate_window(window, self.min_bars())?;
        Ok(self.normalize_pattern(window))
    }
}

/// `x[i+1] - x[i]`; empty for fewer than two values.
pub fn first_difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

// ─── Window extraction helpers ───────────────────────────────────────

/// Fixed-length slice `[start, start + length)` of a series.
pub fn extract_fixed_length(
    series: &[Bar],
    start: usize,
    length: usize,
) -> Result<&[Bar], WindowError> {
    let end = start.saturating_add(length);
    if end > series.len() {
        return Err(WindowError::OutOfBounds {
            start,
            end,
            len: series.len(),
        });
    }
    Ok(&series[start..end])
}

/// Window around a key bar (e.g. a breakout): `lookback` bars before it and
/// `lookforward` bars from it onward, clipped to the series.
pub fn extract_anchored(
    series: &[Bar],
    key_index: usize,
    lookback: usize,
    lookforward: usize,
) -> &[Bar] {
    let start = key_index.saturating_sub(lookback).min(series.len());
    let end = key_index.saturating_add(lookforward).min(series.len());
    &series[start..end.max(start)]
}

/// Start offsets of every full window: `0, step, 2*step, ...` while the
/// window fits. Empty when `window_size` or `step` is zero or the series is
/// shorter than one window.
pub fn window_starts(len: usize, window_size: usize, step: usize) -> impl Iterator<Item = usize> {
    let last = if window_size == 0 || step == 0 || len < window_size {
        None
    } else {
        Some(len - window_size)
    };
    last.into_iter()
        .flat_map(move |last| (0..=last).step_by(step.max(1)))
}

/// Overlapping fixed-size windows with their start offsets.
pub fn sliding_windows(
    series: &[Bar],
    window_size: usize,
    step: usize,
) -> impl Iterator<Item = (usize, &[Bar])> {
    window_starts(series.len(), window_size, step).map(move |i| (i, &series[i..i + window_size]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
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

    #[test]
    fn derivative_shortens_by_one() {
        let p = Preprocessor::default();
        let signal = p.normalize(&bars(&[1.0, 2.0, 4.0, 7.0]), true);
        assert_eq!(signal.len(), 3);
        let raw = p.normalize(&bars(&[1.0, 2.0, 4.0, 7.0]), false);
        assert_eq!(raw.len(), 4);
    }

    #[test]
    fn zscore_has_zero_mean_unit_std() {
        let p = Preprocessor::new(Normalization::Zscore);
        let s = p.normalize(&bars(&[1.0, 5.0, 2.0, 8.0, 3.0]), false);
        let mean = s.iter().sum::<f64>() / s.len() as f64;
        let var = s.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / s.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var.sqrt() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn minmax_maps_into_unit_interval() {
        let p = Preprocessor::new(Normalization::Minmax);
        let s = p.normalize(&bars(&[10.0, 20.0, 15.0]), false);
        assert!(s[0].abs() < 1e-9);
        assert!((s[1] - 1.0).abs() < 1e-6);
        assert!((s[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn identity_keeps_differences() {
        let p = Preprocessor::new(Normalization::None);
        assert_eq!(p.normalize(&bars(&[1.0, 3.0, 2.0]), true), vec![2.0, -1.0]);
    }

    #[test]
    fn constant_series_becomes_zeros() {
        for mode in [Normalization::Zscore, Normalization::Minmax] {
            let s = Preprocessor::new(mode).normalize(&bars(&[5.0; 6]), false);
            assert!(s.iter().all(|x| *x == 0.0), "{mode:?} produced {s:?}");
        }
    }

    #[test]
    fn one_bar_derivative_is_empty() {
        let p = Preprocessor::default();
        assert!(p.normalize(&bars(&[5.0]), true).is_empty());
        assert!(matches!(
            p.checked_normalize(&bars(&[5.0])),
            Err(WindowError::TooShort { need: 2, got: 1 })
        ));
    }

    #[test]
    fn normalization_parses_from_lowercase() {
        let n: Normalization = serde_json::from_str("\"minmax\"").unwrap();
        assert_eq!(n, Normalization::Minmax);
        let n: Normalization = serde_json::from_str("\"zscore\"").unwrap();
        assert_eq!(n, Normalization::Zscore);
    }

    #[test]
    fn fixed_length_extraction_checks_bounds() {
        let series = bars(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(extract_fixed_length(&series, 1, 2).unwrap().len(), 2);
        assert!(extract_fixed_length(&series, 3, 2).is_err());
    }

    #[test]
    fn anchored_extraction_clips() {
        let series = bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let w = extract_anchored(&series, 1, 3, 2);
        assert_eq!(w.len(), 3);
        assert_eq!(w[0].close, 1.0);
        let w = extract_anchored(&series, 4, 1, 10);
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn window_starts_cover_full_windows_only() {
        assert_eq!(window_starts(100, 50, 50).collect::<Vec<_>>(), vec![0, 50]);
        assert_eq!(window_starts(10, 4, 3).collect::<Vec<_>>(), vec![0, 3, 6]);
        assert_eq!(window_starts(3, 4, 1).count(), 0);
        assert_eq!(window_starts(10, 4, 0).count(), 0);
    }

    #[test]
    fn sliding_windows_yield_slices() {
        let series = bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let windows: Vec<_> = sliding_windows(&series, 2, 2).collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].0, 2);
        assert_eq!(windows[1].1[0].close, 3.0);
    }
}
