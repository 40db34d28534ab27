//! Order sizing policy.
//!
//! Turns a candidate's requested size into a fundable whole-unit size given
//! current equity and cash and the run's risk limits.
//!
//! # Formula
//! ```text
//! notional_size = floor(equity * max_position_size_pct/100 / entry_price)
//! risk_size     = floor(equity * per_trade_risk_pct/100 / (entry_price * stop_pct/100))
//! cash_size     = floor(cash / entry_price)                    (longs only)
//! size          = max(0, min(requested_size, notional_size, risk_size?, cash_size?))
//! ```
//!
//! # Example
//! - Equity 100,000, per-trade risk 1% (1,000)
//! - Entry 100, stop 2% below (2.00 per share)
//! - risk_size = 1,000 / 2.00 = 500 shares

use crate::config::{RiskConfig, StopRule};
use crate::domain::Side;

/// Fundable size for one entry. Pure and deterministic.
///
/// `stop_distance_pct` carries a stop distance computed by the caller (the
/// ATR stop); a fixed `stop_loss_pct` in `risk` takes precedence over it.
pub fn compute_size(
    side: Side,
    entry_price: f64,
    equity: f64,
    cash: f64,
    risk: &RiskConfig,
    requested_size: u64,
    stop_distance_pct: Option<f64>,
) -> u64 {
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return 0;
    }
    if side == Side::Short && !risk.allow_short_selling {
        return 0;
    }

    let max_notional = equity * risk.max_position_size_pct / 100.0;
    let mut size = (max_notional / entry_price).floor().min(requested_size as f64);

    let stop_pct = match risk.stop_rule() {
        StopRule::Percent(pct) => Some(pct),
        _ => stop_distance_pct,
    };
    if let Some(stop_pct) = stop_pct.filter(|p| p.is_finite() && *p > 0.0) {
        let risk_capital = equity * risk.per_trade_risk_pct / 100.0;
        let per_unit_risk = entry_price * stop_pct / 100.0;
        size = size.min((risk_capital / per_unit_risk).floor());
    }

    if side == Side::Long {
        size = size.min((cash / entry_price).floor());
    }

    if size.is_nan() || size <= 0.0 {
        0
    } else {
        size as u64
    }
}

/// Stop distance as a percentage of `entry_price` for the bar at `index`.
///
/// `None` when no stop is configured or the ATR is still warming up.
pub fn stop_distance_pct(rule: StopRule, atr: &[f64], index: usize, entry_price: f64) -> Option<f64> {
    match rule {
        StopRule::None => None,
        StopRule::Percent(pct) => Some(pct),
        StopRule::AtrMultiple { mult, .. } => {
            let atr = atr.get(index).copied()?;
            if !atr.is_finite() || atr <= 0.0 || entry_price <= 0.0 {
                return None;
            }
            Some(mult * atr / entry_price * 100.0)
        }
    }
}
