//! CSV bar loading.
//!
//! One file per symbol, named `<SYMBOL>.csv`, with a header row:
//!
//! ```text
//! timestamp,open,high,low,close,volume
//! 2024-01-02 09:15:00,101.5,102.0,100.8,101.9,120500
//! ```
//!
//! Timestamps may be `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare
//! `YYYY-MM-DD` (midnight). Rows must already be in strictly increasing time
//! order; the loader reports violations instead of sorting.
//!
//! A missing file is not an error for group runs: the symbol loads as an
//! empty series and the portfolio router excludes it.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use routelab_core::domain::{BarError, PriceBar, PriceSeries};

/// Timestamp layout used by every CSV this crate writes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{symbol}': {source}")]
    Csv { symbol: String, source: csv::Error },
    #[error("'{symbol}' row {row}: bad timestamp '{value}'")]
    Timestamp {
        symbol: String,
        row: usize,
        value: String,
    },
    #[error("invalid bars for '{symbol}': {source}")]
    Series { symbol: String, source: BarError },
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse one of the accepted timestamp layouts.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Read one symbol's bars from any CSV source.
pub fn read_series<R: Read>(symbol: &str, reader: R) -> Result<PriceSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (row, record) in rdr.deserialize::<CsvBar>().enumerate() {
        let record = record.map_err(|source| LoadError::Csv {
            symbol: symbol.to_string(),
            source,
        })?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            symbol: symbol.to_string(),
            row: row + 1,
            value: record.timestamp.clone(),
        })?;
        bars.push(PriceBar {
            symbol: symbol.to_string(),
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    PriceSeries::new(symbol, bars).map_err(|source| LoadError::Series {
        symbol: symbol.to_string(),
        source,
    })
}

pub fn symbol_path(data_dir: &Path, symbol: &str) -> PathBuf {
    data_dir.join(format!("{symbol}.csv"))
}

/// Load `<data_dir>/<symbol>.csv`.
pub fn load_symbol(data_dir: &Path, symbol: &str) -> Result<PriceSeries, LoadError> {
    let path = symbol_path(data_dir, symbol);
    let file = std::fs::File::open(&path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let series = read_series(symbol, file)?;
    debug!(symbol, bars = series.len(), path = %path.display(), "loaded bars");
    Ok(series)
}

/// Load every symbol, substituting an empty series for missing files.
///
/// Malformed files are still errors.
pub fn load_universe(
    data_dir: &Path,
    symbols: &[String],
) -> Result<BTreeMap<String, PriceSeries>, LoadError> {
    let mut out = BTreeMap::new();
    for symbol in symbols {
        let series = if symbol_path(data_dir, symbol).exists() {
            load_symbol(data_dir, symbol)?
        } else {
            warn!(symbol = %symbol, dir = %data_dir.display(), "no data file, loading empty series");
            PriceSeries::empty(symbol.as_str())
        };
        out.insert(symbol.clone(), series);
    }
    Ok(out)
}
