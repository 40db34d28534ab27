//! Default stop-loss and take-profit exits layered over candidate trades.

use crate::config::{RiskConfig, StopRule};
use crate::domain::{CandidateTrade, PriceBar, PriceSeries, Side};

pub const STOP_LOSS: &str = "stop_loss";
pub const TAKE_PROFIT: &str = "take_profit";

/// Bracket levels of one position.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Levels {
    stop: Option<f64>,
    target: Option<f64>,
}

fn levels(candidate: &CandidateTrade, risk: &RiskConfig, atr_at_entry: Option<f64>) -> Levels {
    let entry = candidate.entry_price;
    let dir = candidate.side.direction();
    let stop = match risk.stop_rule() {
        StopRule::None => None,
        StopRule::Percent(pct) => Some(entry * (1.0 - dir * pct / 100.0)),
        StopRule::AtrMultiple { mult, .. } => atr_at_entry
            .filter(|a| a.is_finite() && *a > 0.0)
            .map(|a| entry - dir * mult * a),
    };
    let target = risk
        .take_profit_pct
        .map(|pct| entry * (1.0 + dir * pct / 100.0));
    Levels { stop, target }
}

/// Fill price if `level` is breached during `bar`; gaps through the level
/// fill at the open.
fn breach(bar: &PriceBar, level: f64, adverse_below: bool) -> Option<f64> {
    if adverse_below {
        (bar.low <= level).then(|| bar.open.min(level))
    } else {
        (bar.high >= level).then(|| bar.open.max(level))
    }
}

/// Truncate each candidate at the first bar after entry, up to and including
/// its exit bar, where the default stop or take-profit triggers. When both
/// trigger in one bar the stop wins.
///
/// `atr` is indexed like `series` and only read for the ATR stop.
pub fn apply_bracket_exits(
    candidates: &[CandidateTrade],
    series: &PriceSeries,
    risk: &RiskConfig,
    atr: &[f64],
) -> Vec<CandidateTrade> {
    if !risk.stop_rule().is_active() && risk.take_profit_pct.is_none() {
        return candidates.to_vec();
    }
    let bars = series.bars();

    candidates
        .iter()
        .map(|candidate| {
            let Some(entry_idx) = series.index_of(candidate.entry_timestamp) else {
                return candidate.clone();
            };
            let last_idx = bars
                .partition_point(|b| b.timestamp <= candidate.exit_timestamp)
                .saturating_sub(1);
            let lv = levels(candidate, risk, atr.get(entry_idx).copied());
            let long = candidate.side == Side::Long;

            for bar in bars.iter().take(last_idx + 1).skip(entry_idx + 1) {
                let stop_fill = lv.stop.and_then(|s| breach(bar, s, long));
                let target_fill = lv.target.and_then(|t| breach(bar, t, !long));
                let hit = match (stop_fill, target_fill) {
                    (Some(price), _) => Some((price, STOP_LOSS)),
                    (None, Some(price)) => Some((price, TAKE_PROFIT)),
                    (None, None) => None,
                };
                if let Some((price, reason)) = hit {
                    return CandidateTrade {
                        exit_timestamp: bar.timestamp,
                        exit_price: price,
                        exit_reason: Some(reason.to_string()),
                        ..candidate.clone()
                    };
                }
            }
            candidate.clone()
        })
        .collect()
}
