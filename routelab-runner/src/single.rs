//! Single-symbol backtest engine.
//!
//! Walks one symbol's bars in order holding at most one position. On every
//! bar the due exit is processed before new entries, so a position closing
//! on bar `t` frees capital for an entry on the same bar.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use routelab_core::domain::{CandidateTrade, EquityPoint, ExecutedTrade, PortfolioState, PriceSeries};
use routelab_core::execution::apply_bracket_exits;
use routelab_core::indicators::{Atr, Indicator};
use routelab_core::{BacktestError, Phase};

use crate::config::SimulationSetup;
use crate::ledger::{self, OpenTrade, Scheduled};
use crate::metrics::MetricsReport;

/// Outcome of one single-symbol simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleRun {
    pub symbol: String,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<ExecutedTrade>,
    /// `initial_capital`, `final_value` and `pnl`.
    pub metrics: MetricsReport,
    /// Candidates that could not be funded or overlapped an open position.
    pub skipped: usize,
    /// Candidates dropped as malformed or not aligned with the bars.
    pub invalid: usize,
}

/// Simulate `candidates` against `series`.
///
/// Candidates are first truncated by the default stop/target brackets.
pub fn run_single(
    series: &PriceSeries,
    candidates: &[CandidateTrade],
    setup: &SimulationSetup,
) -> Result<SingleRun, BacktestError> {
    if series.is_empty() {
        return Err(BacktestError::InsufficientData {
            symbol: series.symbol().to_string(),
            phase: Phase::Simulation,
        });
    }
    let symbol = series.symbol();
    let bars = series.bars();
    let atr = Atr::new(setup.risk.atr_period).compute(bars);
    let bracketed = apply_bracket_exits(candidates, series, &setup.risk, &atr);

    let mut invalid = 0;
    let mut by_entry: BTreeMap<usize, Vec<Scheduled>> = BTreeMap::new();
    for (seq, candidate) in bracketed.iter().enumerate() {
        match ledger::schedule(candidate, series, seq) {
            Some(s) => by_entry.entry(s.entry_index).or_default().push(s),
            None => invalid += 1,
        }
    }

    let mut state = PortfolioState::new(setup.initial_capital);
    let mut open: Option<OpenTrade> = None;
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut skipped = 0;

    for (i, bar) in bars.iter().enumerate() {
        state.mark(symbol, bar.close);

        if open.as_ref().is_some_and(|o| o.is_due(bar.timestamp)) {
            if let Some(position) = open.take() {
                trades.push(ledger::close(&mut state, position, &setup.costs));
            }
        }

        for scheduled in by_entry.remove(&i).unwrap_or_default() {
            if open.is_some() {
                debug!(symbol, entry = %scheduled.candidate.entry_timestamp, "overlaps open position, skipped");
                skipped += 1;
                continue;
            }
            let size = ledger::size_for(&scheduled, &state, 0.0, &setup.risk, &setup.costs, &atr);
            if size == 0 {
                debug!(symbol, entry = %scheduled.candidate.entry_timestamp, "sized to zero, skipped");
                skipped += 1;
                continue;
            }
            open = Some(ledger::open(&mut state, scheduled, size, &setup.costs));
        }

        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: state.equity(),
            cash: state.cash,
        });
    }

    let mut metrics = MetricsReport::new();
    let final_value = state.equity();
    metrics.insert("initial_capital", setup.initial_capital);
    metrics.insert("final_value", final_value);
    metrics.insert("pnl", final_value - setup.initial_capital);

    Ok(SingleRun {
        symbol: symbol.to_string(),
        equity_curve,
        trades,
        metrics,
        skipped,
        invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use routelab_core::domain::{PriceBar, Side, UNBOUNDED_SIZE};
    use routelab_core::signals::END_OF_DATA;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, d)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn series(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                symbol: "ITC".into(),
                timestamp: day(i as u32 + 1),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000.0,
            })
            .collect();
        PriceSeries::new("ITC", bars).unwrap()
    }

    fn long(entry: u32, entry_price: f64, exit: u32, exit_price: f64) -> CandidateTrade {
        CandidateTrade {
            symbol: "ITC".into(),
            side: Side::Long,
            requested_size: UNBOUNDED_SIZE,
            entry_timestamp: day(entry),
            entry_price,
            exit_timestamp: day(exit),
            exit_price,
            entry_reason: None,
            exit_reason: None,
        }
    }

    #[test]
    fn empty_series_is_insufficient_data() {
        let err = run_single(&PriceSeries::empty("ITC"), &[], &SimulationSetup::new(1_000.0)).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::InsufficientData {
                phase: Phase::Simulation,
                ..
            }
        ));
    }

    #[test]
    fn no_candidates_gives_flat_curve() {
        let run = run_single(&series(&[10.0, 11.0, 12.0]), &[], &SimulationSetup::new(1_000.0)).unwrap();
        assert!(run.trades.is_empty());
        assert_eq!(run.equity_curve.len(), 3);
        assert!(run.equity_curve.iter().all(|p| p.equity == 1_000.0));
        assert_eq!(run.metrics.get("pnl"), Some(0.0));
    }

    #[test]
    fn overlapping_candidate_is_skipped() {
        let s = series(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let candidates = [long(1, 10.0, 4, 13.0), long(2, 11.0, 5, 14.0)];
        let run = run_single(&s, &candidates, &SimulationSetup::new(1_000.0)).unwrap();
        assert_eq!(run.trades.len(), 1);
        assert_eq!(run.skipped, 1);
        assert_eq!(run.trades[0].size, 100);
        assert_eq!(run.trades[0].pnl, 300.0);
    }

    #[test]
    fn exit_frees_capital_for_same_bar_entry() {
        let s = series(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let candidates = [long(1, 10.0, 3, 12.0), long(3, 12.0, 5, 14.0)];
        let run = run_single(&s, &candidates, &SimulationSetup::new(1_000.0)).unwrap();
        assert_eq!(run.trades.len(), 2);
        // 1_200 after the first exit buys 100 units at 12.
        assert_eq!(run.trades[1].size, 100);
        assert_eq!(run.metrics.get("final_value"), Some(1_400.0));
    }

    #[test]
    fn exit_beyond_data_closes_at_last_close() {
        let s = series(&[10.0, 11.0, 12.0]);
        let mut c = long(1, 10.0, 3, 12.0);
        c.exit_timestamp = day(28);
        c.exit_price = 99.0;
        let run = run_single(&s, &[c], &SimulationSetup::new(1_000.0)).unwrap();
        let t = &run.trades[0];
        assert_eq!(t.exit_timestamp, day(3));
        assert_eq!(t.exit_price, 12.0);
        assert_eq!(t.exit_reason.as_deref(), Some(END_OF_DATA));
        assert_eq!(t.holding_period_bars, 2);
        assert_eq!(run.equity_curve.last().unwrap().cash, 1_200.0);
    }

    #[test]
    fn invalid_candidates_are_counted() {
        let s = series(&[10.0, 11.0, 12.0]);
        let mut off_bar = long(1, 10.0, 3, 12.0);
        off_bar.entry_timestamp = day(1) + chrono::Duration::hours(1);
        let run = run_single(&s, &[off_bar], &SimulationSetup::new(1_000.0)).unwrap();
        assert_eq!(run.invalid, 1);
        assert!(run.trades.is_empty());
    }
}
