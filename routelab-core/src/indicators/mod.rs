//! Indicators: pure functions from bar history to a numeric series.
//!
//! Every indicator returns a series of the same length as its input, with
//! `f64::NAN` during warmup. A value at bar t never depends on bar t+1 or later.

pub mod atr;
pub mod ema;
pub mod sma;
pub mod zlema;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::PriceBar;

pub use atr::{true_range, wilder_smooth, Atr};
pub use ema::{ema_of_series, Ema};
pub use sma::{sma_of_series, Sma};
pub use zlema::{rolling_max, Zlema};

/// Named `(timestamp, value)` overlays, the chart/export projection of an
/// indicator set. Warmup values are dropped.
pub type NamedSeries = BTreeMap<String, Vec<(NaiveDateTime, f64)>>;

/// A bar-series indicator.
pub trait Indicator: Send + Sync {
    /// Name such as `sma_20` or `atr_14`.
    fn name(&self) -> &str;

    /// Number of leading `NaN` values.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64>;
}

/// Precomputed indicator series, keyed by name and queried by bar index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: BTreeMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Compute `indicator` over `bars` and store it under its own name.
    pub fn compute_into(&mut self, indicator: &dyn Indicator, bars: &[PriceBar]) {
        self.series
            .insert(indicator.name().to_string(), indicator.compute(bars));
    }

    /// Value at `bar_index`; `None` when the name or index is unknown.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Pair every stored series with bar timestamps, dropping `NaN` values.
    pub fn to_named_series(&self, bars: &[PriceBar]) -> NamedSeries {
        self.series
            .iter()
            .map(|(name, values)| {
                let points = bars
                    .iter()
                    .zip(values)
                    .filter(|(_, v)| v.is_finite())
                    .map(|(b, &v)| (b.timestamp, v))
                    .collect();
                (name.clone(), points)
            })
            .collect()
    }
}

/// Synthetic bars from closes: open = previous close, high/low one point
/// outside the body, volume 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                symbol: "TEST".to_string(),
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
