//! OHLCV price-series loading from CSV.
//!
//! Expected header: `timestamp,open,high,low,close[,volume]`. Timestamps may
//! be `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare date (midnight).
//! Rows must be strictly time-ascending; the loader does not sort.

use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use patternlab_core::domain::{validate_window, Bar, WindowError};
use serde::Deserialize;
use thiserror::Error;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read price file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognized timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("price series rejected: {0}")]
    Window(#[from] WindowError),

    #[error("price file has no rows")]
    Empty,
}

/// A loaded series plus its provenance hash.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub bars: Vec<Bar>,
    /// BLAKE3 over the raw file bytes.
    pub dataset_hash: String,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Load a price series from a CSV file.
pub fn load_csv(path: &Path) -> Result<LoadedSeries, LoadError> {
    let bytes = std::fs::read(path)?;
    let bars = parse_csv(bytes.as_slice())?;
    Ok(LoadedSeries {
        bars,
        dataset_hash: blake3::hash(&bytes).to_hex().to_string(),
    })
}

/// Parse bars from any CSV reader.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (row, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::BadTimestamp {
            row: row + 1,
            value: record.timestamp.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume.unwrap_or(0.0),
        });
    }
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    validate_window(&bars, 1)?;
    Ok(bars)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
