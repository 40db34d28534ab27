//! Performance metrics computed from an equity curve and a trade ledger.
//!
//! All metric functions are pure and operate on plain slices. Per-bar returns
//! are `r_t = E_t / E_{t-1} - 1`; the risk-free rate is annual and is
//! converted to a per-bar rate with `bars_per_year`.
//!
//! Ratios that are undefined for the given inputs (zero variance, no downside,
//! no drawdown, no trades) are left out of the report rather than stored as
//! NaN or infinity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use routelab_core::domain::{equity_values, EquityPoint, ExecutedTrade, PriceSeries};
use routelab_core::timeframe::TRADING_DAYS_PER_YEAR;

/// Profit factor reported when there are profits and no losses.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

const VARIANCE_EPSILON: f64 = 1e-15;

/// Annualization inputs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
    pub bars_per_year: f64,
}

impl MetricsSettings {
    pub fn daily() -> Self {
        Self {
            risk_free_rate: 0.0,
            bars_per_year: TRADING_DAYS_PER_YEAR,
        }
    }

    fn per_bar_risk_free(&self) -> f64 {
        if self.bars_per_year > 0.0 {
            self.risk_free_rate / self.bars_per_year
        } else {
            0.0
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self::daily()
    }
}

/// Flat, ordered `name -> value` report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsReport(BTreeMap<String, f64>);

impl MetricsReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a finite value; non-finite values are dropped.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        if value.is_finite() {
            self.0.insert(name.into(), value);
        }
    }

    pub fn insert_opt(&mut self, name: impl Into<String>, value: Option<f64>) {
        if let Some(v) = value {
            self.insert(name, v);
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

/// Compute the full report.
///
/// `initial_capital` is taken from the first equity point, which is always
/// the pre-trade capital because costs are booked at exits.
pub fn compute_metrics(
    equity_curve: &[EquityPoint],
    trades: &[ExecutedTrade],
    settings: &MetricsSettings,
) -> MetricsReport {
    let mut report = MetricsReport::new();
    let values = equity_values(equity_curve);

    if let (Some(&first), Some(&last)) = (values.first(), values.last()) {
        report.insert("initial_capital", first);
        report.insert("final_value", last);
        report.insert("pnl", last - first);
    }
    report.insert("total_return", total_return(&values));
    report.insert("max_drawdown", max_drawdown(&values));

    let returns = bar_returns(&values);
    if !returns.is_empty() {
        let rf = settings.per_bar_risk_free();
        let excess: Vec<f64> = returns.iter().map(|r| r - rf).collect();
        let vol = std_dev(&returns);
        let ann = settings.bars_per_year.max(0.0).sqrt();

        report.insert("volatility", vol);
        report.insert("volatility_annualized", vol * ann);
        report.insert_opt("sharpe", sharpe(&excess));
        report.insert_opt("sharpe_annualized", sharpe(&excess).map(|s| s * ann));
        report.insert_opt("sortino", sortino(&excess));
        let annual = annual_return(total_return(&values), returns.len(), settings.bars_per_year);
        report.insert_opt("annual_return", annual);
        report.insert_opt("calmar", annual.and_then(|a| calmar(a, max_drawdown(&values))));
    }

    add_trade_stats(&mut report, trades);
    report
}

fn add_trade_stats(report: &mut MetricsReport, trades: &[ExecutedTrade]) {
    report.insert("trade_count", trades.len() as f64);
    report.insert("net_pnl", trades.iter().map(|t| t.pnl).sum());
    report.insert("total_commission", trades.iter().map(|t| t.commission).sum());
    report.insert("total_costs", trades.iter().map(|t| t.total_costs()).sum());
    if trades.is_empty() {
        return;
    }

    report.insert_opt("win_rate", win_rate(trades));
    report.insert_opt("avg_win", mean_of(trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl)));
    report.insert_opt("avg_loss", mean_of(trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl)));
    report.insert_opt("profit_factor", profit_factor(trades));
    report.insert("max_consecutive_wins", max_consecutive(trades, true) as f64);
    report.insert("max_consecutive_losses", max_consecutive(trades, false) as f64);
    report.insert_opt(
        "avg_pnl_capture_ratio",
        mean_of(trades.iter().filter_map(|t| t.pnl_capture_ratio)),
    );
}

// ─── Curve metrics ──────────────────────────────────────────────────

/// `E_last / E_first - 1`; zero for fewer than two points.
pub fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) if values.len() >= 2 && first > 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// Per-bar simple returns. A bar after a non-positive value is skipped.
pub fn bar_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Largest peak-to-trough decline as a positive fraction.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.max((peak - v) / peak);
        }
    }
    worst
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Per-bar Sharpe ratio of excess returns; `None` at zero variance.
pub fn sharpe(excess: &[f64]) -> Option<f64> {
    let sd = std_dev(excess);
    if excess.is_empty() || sd < VARIANCE_EPSILON {
        return None;
    }
    Some(mean(excess) / sd)
}

/// Per-bar Sortino ratio; `None` when no bar has a negative excess return.
pub fn sortino(excess: &[f64]) -> Option<f64> {
    if excess.is_empty() {
        return None;
    }
    let downside =
        (excess.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>() / excess.len() as f64).sqrt();
    if downside < VARIANCE_EPSILON {
        return None;
    }
    Some(mean(excess) / downside)
}

pub fn annual_return(total_return: f64, n_returns: usize, bars_per_year: f64) -> Option<f64> {
    let growth = 1.0 + total_return;
    if n_returns == 0 || growth <= 0.0 || bars_per_year <= 0.0 {
        return None;
    }
    Some(growth.powf(bars_per_year / n_returns as f64) - 1.0)
}

pub fn calmar(annual_return: f64, max_drawdown: f64) -> Option<f64> {
    if max_drawdown.abs() < VARIANCE_EPSILON {
        return None;
    }
    Some(annual_return / max_drawdown.abs())
}

// ─── Trade metrics ──────────────────────────────────────────────────

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Winners over winners plus losers; flat trades count for neither.
pub fn win_rate(trades: &[ExecutedTrade]) -> Option<f64> {
    let wins = trades.iter().filter(|t| t.is_winner()).count();
    let losses = trades.iter().filter(|t| t.is_loser()).count();
    let decided = wins + losses;
    (decided > 0).then(|| wins as f64 / decided as f64)
}

/// Gross profit over gross loss, capped at [`PROFIT_FACTOR_CAP`].
pub fn profit_factor(trades: &[ExecutedTrade]) -> Option<f64> {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();
    if gross_loss < 1e-10 {
        return (gross_profit > 0.0).then_some(PROFIT_FACTOR_CAP);
    }
    Some((gross_profit / gross_loss).min(PROFIT_FACTOR_CAP))
}

/// Longest run of winners (or losers) in ledger order; a flat trade breaks
/// both streaks.
pub fn max_consecutive(trades: &[ExecutedTrade], winners: bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for t in trades {
        let hit = if winners { t.is_winner() } else { t.is_loser() };
        if hit {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

// ─── What-if annotation ─────────────────────────────────────────────

/// Fill `max_theoretical_pnl` and `pnl_capture_ratio` for every trade from
/// the closes between its entry and the end of its symbol's series.
///
/// The ratio is `None` when the best achievable PnL is not positive. Trades
/// whose symbol has no series keep both fields as `None`.
pub fn annotate_what_if(trades: &mut [ExecutedTrade], series_by_symbol: &BTreeMap<String, PriceSeries>) {
    for trade in trades.iter_mut() {
        let Some(series) = series_by_symbol.get(&trade.symbol) else {
            continue;
        };
        let dir = trade.side.direction();
        let size = trade.size as f64;
        let best = series
            .bars()
            .iter()
            .filter(|b| b.timestamp >= trade.entry_timestamp)
            .map(|b| dir * (b.close - trade.entry_price) * size)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        trade.max_theoretical_pnl = best;
        trade.pnl_capture_ratio = best.filter(|m| *m > 0.0).map(|m| trade.pnl / m);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use routelab_core::config::ProductType;
    use routelab_core::domain::{PriceBar, Side};

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: ts(i as u32 + 1),
                equity: v,
                cash: v,
            })
            .collect()
    }

    fn trade(pnl: f64) -> ExecutedTrade {
        ExecutedTrade {
            symbol: "INFY".into(),
            side: Side::Long,
            product_type: ProductType::Delivery,
            entry_timestamp: ts(2),
            entry_price: 100.0,
            exit_timestamp: ts(5),
            exit_price: 100.0 + pnl / 10.0,
            entry_reason: None,
            exit_reason: None,
            requested_size: 10,
            size: 10,
            gross_pnl: pnl,
            commission: 0.0,
            slippage: 0.0,
            other_charges: 0.0,
            pnl,
            pnl_pct: pnl / 1000.0 * 100.0,
            holding_period_bars: 3,
            max_theoretical_pnl: None,
            pnl_capture_ratio: None,
        }
    }

    #[test]
    fn drawdown_and_return() {
        let v = [100.0, 120.0, 90.0, 110.0];
        assert!((max_drawdown(&v) - 0.25).abs() < 1e-12);
        assert!((total_return(&v) - 0.10).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn flat_curve_omits_undefined_ratios() {
        let report = compute_metrics(&curve(&[1000.0; 5]), &[], &MetricsSettings::daily());
        assert_eq!(report.get("total_return"), Some(0.0));
        assert_eq!(report.get("max_drawdown"), Some(0.0));
        assert_eq!(report.get("volatility"), Some(0.0));
        assert!(!report.contains("sharpe"));
        assert!(!report.contains("sortino"));
        assert!(!report.contains("calmar"));
        assert!(!report.contains("win_rate"));
        assert_eq!(report.get("trade_count"), Some(0.0));
        assert!(report.iter().all(|(_, v)| v.is_finite()));
    }

    #[test]
    fn sharpe_and_sortino_of_known_returns() {
        let excess = [0.01, -0.01, 0.02, 0.0];
        // mean 0.005, population std sqrt(0.000125)
        let s = sharpe(&excess).unwrap();
        assert!((s - 0.005 / 0.000125_f64.sqrt()).abs() < 1e-12);
        // downside deviation sqrt(0.0001 / 4) = 0.005
        let so = sortino(&excess).unwrap();
        assert!((so - 1.0).abs() < 1e-12);
        assert!(sortino(&[0.01, 0.02]).is_none());
    }

    #[test]
    fn annual_return_compounds() {
        let a = annual_return(0.21, 2, 1.0).unwrap();
        assert!((a - 0.1).abs() < 1e-12);
        assert!(annual_return(-1.5, 10, 252.0).is_none());
    }

    #[test]
    fn trade_stats() {
        let trades = vec![trade(100.0), trade(50.0), trade(-30.0), trade(0.0), trade(20.0)];
        assert_eq!(win_rate(&trades), Some(0.75));
        assert!((profit_factor(&trades).unwrap() - 170.0 / 30.0).abs() < 1e-12);
        assert_eq!(max_consecutive(&trades, true), 2);
        assert_eq!(max_consecutive(&trades, false), 1);

        let report = compute_metrics(&curve(&[1000.0, 1140.0]), &trades, &MetricsSettings::daily());
        assert_eq!(report.get("trade_count"), Some(5.0));
        assert_eq!(report.get("avg_loss"), Some(-30.0));
        assert!((report.get("avg_win").unwrap() - 170.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.get("net_pnl"), Some(140.0));
    }

    #[test]
    fn profit_factor_caps_without_losses() {
        assert_eq!(profit_factor(&[trade(10.0)]), Some(PROFIT_FACTOR_CAP));
        assert_eq!(profit_factor(&[trade(0.0)]), None);
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let c = curve(&[100.0, 101.0, 100.5, 102.0, 103.0]);
        let base = compute_metrics(&c, &[], &MetricsSettings::daily());
        let with_rf = compute_metrics(
            &c,
            &[],
            &MetricsSettings {
                risk_free_rate: 0.5,
                bars_per_year: 252.0,
            },
        );
        assert!(with_rf.get("sharpe").unwrap() < base.get("sharpe").unwrap());
        assert_eq!(base.get("volatility"), with_rf.get("volatility"));
    }

    #[test]
    fn what_if_looks_past_the_exit_to_end_of_run() {
        let bars: Vec<PriceBar> = [100.0, 104.0, 112.0, 106.0, 103.0, 150.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                symbol: "INFY".into(),
                timestamp: ts(i as u32 + 1),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect();
        let mut by_symbol = BTreeMap::new();
        by_symbol.insert("INFY".to_string(), PriceSeries::new("INFY", bars).unwrap());

        // Entry day 2 at 100, exit day 5 at 103; the day-6 close of 150 counts.
        let mut trades = vec![trade(30.0)];
        annotate_what_if(&mut trades, &by_symbol);
        assert_eq!(trades[0].max_theoretical_pnl, Some(500.0));
        assert!((trades[0].pnl_capture_ratio.unwrap() - 0.06).abs() < 1e-12);
    }
}
