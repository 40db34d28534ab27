//! Equity and benchmark curve points.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One point of a realised equity curve.
///
/// `cash` is carried alongside `equity` so callers can audit the accounting
/// identity `equity == cash + open position value` from the output alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub cash: f64,
}

impl EquityPoint {
    /// Mark-to-market value of open positions at this point.
    pub fn exposure(&self) -> f64 {
        self.equity - self.cash
    }
}

/// A `(timestamp, value)` point of a comparison curve (benchmark, overlay).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Extract the equity values of a curve, in order.
pub fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.equity).collect()
}
