//! PriceBar and PriceSeries: the market data consumed by the engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV observation for a symbol at a timestamp.
///
/// Owned by the external data layer; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Errors raised when a bar sequence breaks the input contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index} belongs to '{found}', expected '{expected}'")]
    SymbolMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("timestamps not strictly increasing at bar {index} ({timestamp})")]
    NotIncreasing {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("negative volume {volume} at bar {index}")]
    NegativeVolume { index: usize, volume: f64 },
}

/// Time-ordered bars of a single symbol.
///
/// Construction enforces strictly increasing, unique timestamps. Gaps are
/// taken as given; the engine never fills missing bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, BarError> {
        let symbol = symbol.into();
        for (index, bar) in bars.iter().enumerate() {
            if bar.symbol != symbol {
                return Err(BarError::SymbolMismatch {
                    index,
                    expected: symbol,
                    found: bar.symbol.clone(),
                });
            }
            if bar.volume < 0.0 {
                return Err(BarError::NegativeVolume {
                    index,
                    volume: bar.volume,
                });
            }
            if index > 0 && bars[index - 1].timestamp >= bar.timestamp {
                return Err(BarError::NotIncreasing {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    /// An empty series for `symbol`.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Index of the bar stamped exactly `timestamp`.
    pub fn index_of(&self, timestamp: NaiveDateTime) -> Option<usize> {
        self.bars
            .binary_search_by_key(&timestamp, |b| b.timestamp)
            .ok()
    }

    /// Index of the first bar at or after `timestamp`.
    pub fn index_at_or_after(&self, timestamp: NaiveDateTime) -> Option<usize> {
        let idx = self.bars.partition_point(|b| b.timestamp < timestamp);
        (idx < self.bars.len()).then_some(idx)
    }

    /// Sub-series restricted to `[start, end)`; either bound is optional.
    pub fn within(&self, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        let bars = self
            .bars
            .iter()
            .filter(|b| start.map_or(true, |s| b.timestamp >= s))
            .filter(|b| end.map_or(true, |e| b.timestamp < e))
            .cloned()
            .collect();
        Self {
            symbol: self.symbol.clone(),
            bars,
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
