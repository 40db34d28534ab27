//! Strategy signal generators.
//!
//! A generator turns one symbol's price series into candidate round trips.
//! Generators are stateless: everything they need arrives through the series
//! and the parameter map, and they never see portfolio state. A candidate's
//! entry and exit decisions only use bars at or before the bar they fire on.

pub mod registry;
pub mod sma_crossover;
pub mod zero_lag_trend;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{CandidateTrade, PriceSeries, Side, UNBOUNDED_SIZE};
use crate::error::ConfigError;
use crate::indicators::NamedSeries;

pub use registry::StrategyRegistry;
pub use sma_crossover::SmaCrossover;
pub use zero_lag_trend::ZeroLagTrend;

/// Exit reason for positions still open on the last bar.
pub const END_OF_DATA: &str = "end_of_data";

/// Ordered strategy parameters (`name -> value`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, f64>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn raw(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Named parameter, falling back to `default`.
    pub fn param(&self, name: &str, default: f64) -> f64 {
        self.raw(name).unwrap_or(default)
    }

    pub fn param_usize(&self, name: &str, default: usize) -> usize {
        self.raw(name)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    /// Non-zero means true.
    pub fn flag(&self, name: &str) -> bool {
        self.raw(name).map_or(false, |v| v != 0.0)
    }

    /// Strategy-level quantity cap, `UNBOUNDED_SIZE` when unset or zero.
    pub fn requested_size(&self) -> u64 {
        match self.raw("quantity") {
            Some(q) if q.is_finite() && q >= 1.0 => q as u64,
            _ => UNBOUNDED_SIZE,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, f64)> for StrategyParams {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A strategy: candidate trades plus the indicator overlays it trades on.
pub trait SignalGenerator: Send + Sync {
    /// Registry key, e.g. `sma_crossover`.
    fn code(&self) -> &'static str;

    /// Minimum bars before any candidate can be produced.
    fn min_bars(&self, params: &StrategyParams) -> usize;

    /// Reject parameter sets the generator cannot run with.
    fn validate(&self, params: &StrategyParams) -> Result<(), ConfigError>;

    /// Candidates sorted by entry timestamp. Empty when the series is shorter
    /// than `min_bars`.
    fn generate(&self, series: &PriceSeries, params: &StrategyParams) -> Vec<CandidateTrade>;

    /// Indicator overlays keyed by name, warmup dropped.
    fn overlays(&self, series: &PriceSeries, params: &StrategyParams) -> NamedSeries;
}

// ─── Shared parameter checks ─────────────────────────────────────────

pub(crate) fn invalid(param: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParam {
        param: param.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn check_flag(params: &StrategyParams, name: &str) -> Result<(), ConfigError> {
    match params.raw(name) {
        None => Ok(()),
        Some(v) if v == 0.0 || v == 1.0 => Ok(()),
        Some(v) => Err(invalid(name, format!("expected 0 or 1, got {v}"))),
    }
}

pub(crate) fn check_quantity(params: &StrategyParams) -> Result<(), ConfigError> {
    match params.raw("quantity") {
        None => Ok(()),
        Some(q) if q.is_finite() && q >= 0.0 && q.fract() == 0.0 => Ok(()),
        Some(q) => Err(invalid(
            "quantity",
            format!("expected a non-negative whole number, got {q}"),
        )),
    }
}

// ─── Position walk ───────────────────────────────────────────────────

/// Labels attached to the two directional events of a strategy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EventLabels {
    pub bullish: &'static str,
    pub bearish: &'static str,
}

impl EventLabels {
    fn for_side(&self, side: Side) -> &'static str {
        match side {
            Side::Long => self.bullish,
            Side::Short => self.bearish,
        }
    }
}

/// Turn per-bar directional events into close-to-close round trips.
///
/// A bullish event (`Some(Side::Long)`) closes an open short and opens a long;
/// a bearish event mirrors it. Shorts only open when `allow_short` is set. A
/// position still open at the end exits at the last close, unless it was
/// entered on the last bar itself.
pub(crate) fn walk_events(
    series: &PriceSeries,
    events: &[Option<Side>],
    allow_short: bool,
    requested_size: u64,
    labels: EventLabels,
) -> Vec<CandidateTrade> {
    let bars = series.bars();
    let mut trades = Vec::new();
    let mut open: Option<(Side, usize)> = None;

    let mut close_trade = |side: Side, entry: usize, exit: usize, reason: &str| {
        trades.push(CandidateTrade {
            symbol: series.symbol().to_string(),
            side,
            requested_size,
            entry_timestamp: bars[entry].timestamp,
            entry_price: bars[entry].close,
            exit_timestamp: bars[exit].timestamp,
            exit_price: bars[exit].close,
            entry_reason: Some(labels.for_side(side).to_string()),
            exit_reason: Some(reason.to_string()),
        });
    };

    for (i, event) in events.iter().enumerate().take(bars.len()) {
        let Some(direction) = *event else { continue };
        if let Some((side, entry)) = open {
            if side == direction {
                continue;
            }
            close_trade(side, entry, i, labels.for_side(direction));
            open = None;
        }
        if direction == Side::Long || allow_short {
            open = Some((direction, i));
        }
    }

    if let Some((side, entry)) = open {
        let last = bars.len() - 1;
        if entry < last {
            close_trade(side, entry, last, END_OF_DATA);
        }
    }

    trades
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::{PriceBar, PriceSeries};
    use chrono::{NaiveDate, NaiveDateTime};

    pub fn day(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(i as i64)
    }

    pub fn series_from_closes(symbol: &str, closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                symbol: symbol.to_string(),
                timestamp: day(i),
                open: close,
                high: close + 1.0,
                low: (close - 1.0).max(0.01),
                close,
                volume: 10_000.0,
            })
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }
}
