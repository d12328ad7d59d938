//! Bar — one OHLCV row of a price window.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar at a single timestamp.
///
/// Windows are plain slices of bars, time-ascending with unique timestamps.
/// The matching engine only reads `close` and `timestamp`; the remaining
/// columns travel with the window so callers can redraw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }
}

/// Errors raised when a window cannot be turned into a signal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("window too short: need at least {need} bars, got {got}")]
    TooShort { need: usize, got: usize },

    #[error("timestamps not strictly increasing at bar {index}")]
    NonIncreasingTimestamp { index: usize },

    #[error("non-finite close price at bar {index}")]
    NonFiniteClose { index: usize },

    #[error("window [{start}, {end}) out of bounds for series of {len} bars")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

/// Check the collaborator contract for a window: at least `min_bars` rows,
/// finite closes, strictly increasing timestamps.
pub fn validate_window(bars: &[Bar], min_bars: usize) -> Result<(), WindowError> {
    if bars.len() < min_bars {
        return Err(WindowError::TooShort {
            need: min_bars,
            got: bars.len(),
        });
    }
    for (i, bar) in bars.iter().enumerate() {
        if !bar.close.is_finite() {
            return Err(WindowError::NonFiniteClose { index: i });
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(WindowError::NonIncreasingTimestamp { index: i });
        }
    }
    Ok(())
}

/// Close prices of a window, in order.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
