//! Capital-aware portfolio router.
//!
//! Merges the candidates of several symbols onto one timeline and funds them
//! from a single pool of capital. For every timestamp in the union of bar
//! timestamps:
//!
//! 1. mark open positions at this bar's closes
//! 2. close due exits, ordered by (symbol, entry time)
//! 3. gather the candidates entering on this bar
//! 4. drop candidates that cannot be funded (short permission, per-symbol
//!    cap, zero size)
//! 5. score and rank the rest (score descending, then symbol, entry time,
//!    exit time and input order)
//! 6. allocate in rank order, re-checking caps and re-sizing against the
//!    state left by earlier acceptances
//! 7. record diagnostics and one equity point
//!
//! Candidates are bound to their symbol's bars up front; an exit beyond the
//! symbol's last bar closes at that bar with reason `end_of_data`.

pub mod diagnostics;
pub mod scoring;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use routelab_core::domain::{CandidateTrade, EquityPoint, ExecutedTrade, PortfolioState, PriceSeries, Side};
use routelab_core::execution::apply_bracket_exits;
use routelab_core::indicators::{Atr, Indicator};
use routelab_core::signals::{SignalGenerator, StrategyParams};
use routelab_core::BacktestError;

use crate::config::SimulationSetup;
use crate::ledger::{self, OpenTrade, Scheduled};
use crate::single::run_single;

pub use diagnostics::{BarDiagnostics, ExcludedSymbol, RejectReason, RoutingDiagnostics};
pub use scoring::{
    compute_features, scorer_from_config, CandidateFeatures, CandidateScorer, FlatScorer,
    MomentumLiquidityScorer,
};

/// Outcome of one routed multi-symbol simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRun {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<ExecutedTrade>,
    pub diagnostics: RoutingDiagnostics,
    /// Non-flat positions after the last bar.
    pub final_holdings: BTreeMap<String, i64>,
    pub final_cash: f64,
}

struct SymbolBook<'a> {
    series: &'a PriceSeries,
    atr: Vec<f64>,
    cursor: usize,
}

/// Route `candidates_by_symbol` through one shared portfolio.
///
/// Symbols without bars are excluded and reported in the diagnostics; the
/// run fails with `NoCoverage` only when no symbol has bars at all.
pub fn simulate_portfolio(
    series_by_symbol: &BTreeMap<String, PriceSeries>,
    candidates_by_symbol: &BTreeMap<String, Vec<CandidateTrade>>,
    setup: &SimulationSetup,
    scorer: &dyn CandidateScorer,
) -> Result<PortfolioRun, BacktestError> {
    let mut diagnostics = RoutingDiagnostics::default();
    let requested: BTreeSet<&str> = series_by_symbol
        .keys()
        .chain(candidates_by_symbol.keys())
        .map(String::as_str)
        .collect();

    let mut books: BTreeMap<&str, SymbolBook> = BTreeMap::new();
    for &symbol in &requested {
        match series_by_symbol.get(symbol).filter(|s| !s.is_empty()) {
            Some(series) => {
                let atr = Atr::new(setup.risk.atr_period).compute(series.bars());
                books.insert(symbol, SymbolBook { series, atr, cursor: 0 });
            }
            None => {
                warn!(symbol, "no price data, symbol excluded");
                diagnostics.exclude(symbol, "no price data");
            }
        }
    }
    if books.is_empty() {
        return Err(BacktestError::NoCoverage {
            requested: requested.len(),
        });
    }

    // Bind every candidate to its bars, keyed by entry timestamp.
    let mut pending: BTreeMap<NaiveDateTime, Vec<Scheduled>> = BTreeMap::new();
    let mut seq = 0;
    for (symbol, candidates) in candidates_by_symbol {
        let Some(book) = books.get(symbol.as_str()) else {
            continue;
        };
        let bracketed = apply_bracket_exits(candidates, book.series, &setup.risk, &book.atr);
        for candidate in &bracketed {
            match ledger::schedule(candidate, book.series, seq) {
                Some(s) => pending.entry(s.candidate.entry_timestamp).or_default().push(s),
                None => {
                    warn!(symbol = %symbol, entry = %candidate.entry_timestamp, "invalid candidate dropped");
                    diagnostics.reject(RejectReason::Invalid);
                }
            }
            seq += 1;
        }
    }

    let timeline: BTreeSet<NaiveDateTime> = books
        .values()
        .flat_map(|b| b.series.bars().iter().map(|bar| bar.timestamp))
        .collect();

    let mut state = PortfolioState::new(setup.initial_capital);
    let mut open: Vec<OpenTrade> = Vec::new();
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(timeline.len());
    let allocation = &setup.allocation;

    for &t in &timeline {
        // 1. Mark-to-market.
        for (&symbol, book) in books.iter_mut() {
            if let Some(bar) = book.series.bars().get(book.cursor) {
                if bar.timestamp == t {
                    state.mark(symbol, bar.close);
                    book.cursor += 1;
                }
            }
        }

        // 2. Exits before entries.
        let (mut due, still_open): (Vec<_>, Vec<_>) = open.into_iter().partition(|o| o.is_due(t));
        open = still_open;
        due.sort_by(|a, b| exit_order(&a.scheduled, &b.scheduled));
        for position in due {
            trades.push(ledger::close(&mut state, position, &setup.costs));
        }

        // 3-4. Gather, filter, score.
        let todays = pending.remove(&t).unwrap_or_default();
        let candidate_count = todays.len();
        let mut ranked: Vec<(f64, Scheduled)> = Vec::with_capacity(candidate_count);
        for scheduled in todays {
            let Some(book) = books.get(scheduled.candidate.symbol.as_str()) else {
                continue;
            };
            if let Some(reason) = precheck(&scheduled, &open, &state, setup, &book.atr) {
                debug!(
                    symbol = %scheduled.candidate.symbol,
                    entry = %t,
                    reason = reason.as_str(),
                    "candidate rejected"
                );
                diagnostics.reject(reason);
                continue;
            }
            let features = compute_features(book.series, scheduled.entry_index, setup.scoring.lookback);
            let score = scorer.score(&scheduled.candidate, &features);
            let score = if score.is_nan() { f64::NEG_INFINITY } else { score };
            ranked.push((score, scheduled));
        }

        // 5. Rank.
        ranked.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| rank_order(a, b)));

        // 6. Allocate.
        let mut accepted = 0;
        for (score, scheduled) in ranked {
            let symbol = scheduled.candidate.symbol.clone();
            let reason = if allocation.max_entries_per_bar.is_some_and(|cap| accepted >= cap) {
                Some(RejectReason::BarCap)
            } else if allocation.max_open_positions.is_some_and(|cap| open.len() >= cap) {
                Some(RejectReason::OpenCap)
            } else if open_count(&open, &symbol) >= allocation.max_positions_per_symbol {
                Some(RejectReason::PositionCap)
            } else {
                None
            };
            let size = match (reason, books.get(symbol.as_str())) {
                (None, Some(book)) => ledger::size_for(
                    &scheduled,
                    &state,
                    reserved(&open),
                    &setup.risk,
                    &setup.costs,
                    &book.atr,
                ),
                _ => 0,
            };
            if size == 0 {
                let reason = reason.unwrap_or(RejectReason::ZeroSize);
                debug!(symbol = %symbol, entry = %t, reason = reason.as_str(), "candidate rejected");
                diagnostics.reject(reason);
                continue;
            }
            debug!(symbol = %symbol, entry = %t, size, score, "candidate accepted");
            open.push(ledger::open(&mut state, scheduled, size, &setup.costs));
            accepted += 1;
        }

        // 7. Record.
        diagnostics.record_bar(t, candidate_count, accepted);
        equity_curve.push(EquityPoint {
            timestamp: t,
            equity: state.equity(),
            cash: state.cash,
        });
    }

    Ok(PortfolioRun {
        equity_curve,
        trades,
        diagnostics,
        final_holdings: state.holdings(),
        final_cash: state.cash,
    })
}

/// First reason a candidate cannot be funded against the current state.
fn precheck(
    scheduled: &Scheduled,
    open: &[OpenTrade],
    state: &PortfolioState,
    setup: &SimulationSetup,
    atr: &[f64],
) -> Option<RejectReason> {
    let c = &scheduled.candidate;
    let effective = ledger::risk_for(c, &setup.risk, &setup.costs);
    if c.side == Side::Short && !effective.allow_short_selling {
        return Some(RejectReason::ShortNotAllowed);
    }
    if open_count(open, &c.symbol) >= setup.allocation.max_positions_per_symbol {
        return Some(RejectReason::PositionCap);
    }
    if ledger::size_for(scheduled, state, reserved(open), &setup.risk, &setup.costs, atr) == 0 {
        return Some(RejectReason::ZeroSize);
    }
    None
}

/// Cash held back for the open longs' round-trip costs.
fn reserved(open: &[OpenTrade]) -> f64 {
    open.iter().map(|o| o.reserve).sum()
}

fn open_count(open: &[OpenTrade], symbol: &str) -> usize {
    open.iter().filter(|o| o.symbol() == symbol).count()
}

fn exit_order(a: &Scheduled, b: &Scheduled) -> Ordering {
    a.candidate
        .symbol
        .cmp(&b.candidate.symbol)
        .then(a.candidate.entry_timestamp.cmp(&b.candidate.entry_timestamp))
        .then(a.seq.cmp(&b.seq))
}

fn rank_order(a: &Scheduled, b: &Scheduled) -> Ordering {
    a.candidate
        .symbol
        .cmp(&b.candidate.symbol)
        .then(a.candidate.entry_timestamp.cmp(&b.candidate.entry_timestamp))
        .then(a.candidate.exit_timestamp.cmp(&b.candidate.exit_timestamp))
        .then(a.seq.cmp(&b.seq))
}

/// Run each symbol through the single-symbol engine in parallel and turn its
/// trades into portfolio candidates capped at the single-engine size.
///
/// Symbols without bars yield no candidates.
pub fn generate_portfolio_candidates(
    generator: &dyn SignalGenerator,
    params: &StrategyParams,
    series_by_symbol: &BTreeMap<String, PriceSeries>,
    setup: &SimulationSetup,
) -> Result<BTreeMap<String, Vec<CandidateTrade>>, BacktestError> {
    let per_symbol = series_by_symbol
        .par_iter()
        .filter(|(_, series)| !series.is_empty())
        .map(|(symbol, series)| {
            let candidates = generator.generate(series, params);
            let run = run_single(series, &candidates, setup)?;
            let routed = run.trades.into_iter().map(trade_to_candidate).collect();
            Ok((symbol.clone(), routed))
        })
        .collect::<Result<Vec<(String, Vec<CandidateTrade>)>, BacktestError>>()?;
    Ok(per_symbol.into_iter().collect())
}

fn trade_to_candidate(trade: ExecutedTrade) -> CandidateTrade {
    CandidateTrade {
        symbol: trade.symbol,
        side: trade.side,
        requested_size: trade.size,
        entry_timestamp: trade.entry_timestamp,
        entry_price: trade.entry_price,
        exit_timestamp: trade.exit_timestamp,
        exit_price: trade.exit_price,
        entry_reason: trade.entry_reason,
        exit_reason: trade.exit_reason,
    }
}
