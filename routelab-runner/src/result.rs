//! Serializable result of one backtest run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use routelab_core::domain::{CurvePoint, EquityPoint, ExecutedTrade};
use routelab_core::indicators::NamedSeries;
use routelab_core::signals::StrategyParams;
use routelab_core::timeframe::Timeframe;

use crate::config::RunMode;
use crate::metrics::MetricsReport;
use crate::portfolio::{ExcludedSymbol, RoutingDiagnostics};

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Per-symbol slice of the trade ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub trade_count: usize,
    pub net_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    pub params: StrategyParams,
    pub mode: RunMode,
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub initial_capital: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<ExecutedTrade>,
    pub metrics: MetricsReport,
    /// Equal-weight buy-and-hold curve of the same universe.
    pub benchmark: Vec<CurvePoint>,
    /// Strategy overlays per symbol.
    pub indicators: BTreeMap<String, NamedSeries>,
    /// Present for portfolio runs only.
    pub routing: Option<RoutingDiagnostics>,
    pub per_symbol: BTreeMap<String, SymbolSummary>,
    pub excluded: Vec<ExcludedSymbol>,
}

impl BacktestResult {
    /// BLAKE3 hex digest of the serialized equity curve and trade ledger.
    ///
    /// Two runs with identical inputs produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, &self.equity_curve).expect("equity curve must serialize");
        serde_json::to_writer(&mut hasher, &self.trades).expect("trade ledger must serialize");
        hasher.finalize().to_hex().to_string()
    }

    pub fn final_value(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}

/// Trade count and net PnL per symbol, in symbol order.
pub fn summarize_by_symbol(trades: &[ExecutedTrade]) -> BTreeMap<String, SymbolSummary> {
    let mut out: BTreeMap<String, SymbolSummary> = BTreeMap::new();
    for t in trades {
        let entry = out.entry(t.symbol.clone()).or_default();
        entry.trade_count += 1;
        entry.net_pnl += t.pnl;
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use routelab_core::config::ProductType;
    use routelab_core::domain::Side;

    pub(crate) fn sample_result() -> BacktestResult {
        let ts = |d| {
            NaiveDate::from_ymd_opt(2024, 8, d)
                .unwrap()
                .and_hms_opt(15, 30, 0)
                .unwrap()
        };
        let trade = |symbol: &str, pnl: f64| ExecutedTrade {
            symbol: symbol.into(),
            side: Side::Long,
            product_type: ProductType::Delivery,
            entry_timestamp: ts(1),
            entry_price: 100.0,
            exit_timestamp: ts(2),
            exit_price: 100.0 + pnl,
            entry_reason: Some("golden_cross".into()),
            exit_reason: Some("death_cross".into()),
            requested_size: 1,
            size: 1,
            gross_pnl: pnl,
            commission: 0.0,
            slippage: 0.0,
            other_charges: 0.0,
            pnl,
            pnl_pct: pnl,
            holding_period_bars: 1,
            max_theoretical_pnl: None,
            pnl_capture_ratio: None,
        };
        let trades = vec![trade("INFY", 5.0), trade("TCS", -2.0), trade("INFY", 1.0)];
        BacktestResult {
            schema_version: SCHEMA_VERSION,
            strategy: "sma_crossover".into(),
            params: StrategyParams::new().with("fast", 2.0),
            mode: RunMode::Portfolio,
            symbols: vec!["INFY".into(), "TCS".into()],
            timeframe: Timeframe::Daily,
            initial_capital: 1_000.0,
            equity_curve: vec![
                EquityPoint {
                    timestamp: ts(1),
                    equity: 1_000.0,
                    cash: 1_000.0,
                },
                EquityPoint {
                    timestamp: ts(2),
                    equity: 1_004.0,
                    cash: 1_004.0,
                },
            ],
            per_symbol: summarize_by_symbol(&trades),
            trades,
            metrics: MetricsReport::new(),
            benchmark: Vec::new(),
            indicators: BTreeMap::new(),
            routing: None,
            excluded: Vec::new(),
        }
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = sample_result();
        let b = sample_result();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut c = sample_result();
        c.trades[0].pnl += 0.01;
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_report_fields() {
        let a = sample_result();
        let mut b = sample_result();
        b.metrics.insert("sharpe", 1.0);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn per_symbol_summary() {
        let r = sample_result();
        assert_eq!(r.per_symbol["INFY"].trade_count, 2);
        assert_eq!(r.per_symbol["INFY"].net_pnl, 6.0);
        assert_eq!(r.per_symbol["TCS"].net_pnl, -2.0);
        assert_eq!(r.final_value(), 1_004.0);
    }
}
