//! Position bookkeeping shared by the single-symbol and portfolio engines.
//!
//! A candidate is first *scheduled* against its symbol's bars: the entry must
//! sit on a bar, and an exit beyond the last bar is pulled back to the last
//! close with reason `end_of_data`. Scheduled candidates carry the bar indices
//! both engines need for holding periods and stop distances.

use routelab_core::config::{CostsConfig, RiskConfig};
use routelab_core::domain::{CandidateTrade, ExecutedTrade, PortfolioState, PriceSeries, Side};
use routelab_core::execution::{apply_costs, resolve_product, CostReserve};
use routelab_core::signals::END_OF_DATA;
use routelab_core::sizing::{compute_size, stop_distance_pct};

/// A validated candidate bound to its symbol's bar indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Scheduled {
    /// Position in the engine's input order, used as the last tie-break.
    pub seq: usize,
    pub candidate: CandidateTrade,
    pub entry_index: usize,
    /// Last bar at or before the (possibly clamped) exit.
    pub exit_index: usize,
}

/// Bind `candidate` to `series`, or `None` if it cannot be traded.
///
/// Rejected: malformed candidates, symbol mismatches, entries that are not on
/// a bar and round trips that collapse to zero length after clamping.
pub(crate) fn schedule(candidate: &CandidateTrade, series: &PriceSeries, seq: usize) -> Option<Scheduled> {
    if !candidate.is_well_formed() || candidate.symbol != series.symbol() {
        return None;
    }
    let entry_index = series.index_of(candidate.entry_timestamp)?;
    let last = series.last()?;

    let mut candidate = candidate.clone();
    if candidate.exit_timestamp > last.timestamp {
        candidate.exit_timestamp = last.timestamp;
        candidate.exit_price = last.close;
        candidate.exit_reason = Some(END_OF_DATA.to_string());
    }
    if candidate.exit_timestamp <= candidate.entry_timestamp {
        return None;
    }
    let exit_index = series
        .bars()
        .partition_point(|b| b.timestamp <= candidate.exit_timestamp)
        .checked_sub(1)?;

    Some(Scheduled {
        seq,
        candidate,
        entry_index,
        exit_index,
    })
}

/// A funded position awaiting its exit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OpenTrade {
    pub scheduled: Scheduled,
    pub size: u64,
    /// Cash held back for this long's round-trip costs; zero for shorts.
    pub reserve: f64,
}

impl OpenTrade {
    pub fn symbol(&self) -> &str {
        &self.scheduled.candidate.symbol
    }

    pub fn is_due(&self, timestamp: chrono::NaiveDateTime) -> bool {
        self.scheduled.candidate.exit_timestamp <= timestamp
    }
}

/// Effective risk limits for a candidate once its product type is known.
pub(crate) fn risk_for(candidate: &CandidateTrade, risk: &RiskConfig, costs: &CostsConfig) -> RiskConfig {
    let product = resolve_product(
        costs.product_type,
        candidate.entry_timestamp,
        candidate.exit_timestamp,
    );
    risk.for_product(product)
}

/// Fundable size of `scheduled` against the current state.
///
/// `reserved` is the cash already held back by open longs. A long is sized
/// against what is left after that and after its own round-trip reserve, so
/// exit costs can never push cash below zero.
pub(crate) fn size_for(
    scheduled: &Scheduled,
    state: &PortfolioState,
    reserved: f64,
    risk: &RiskConfig,
    costs: &CostsConfig,
    atr: &[f64],
) -> u64 {
    let c = &scheduled.candidate;
    let effective = risk_for(c, risk, costs);
    let stop_pct = stop_distance_pct(effective.stop_rule(), atr, scheduled.entry_index, c.entry_price);
    let funding = match c.side {
        Side::Long => CostReserve::for_entry(c.entry_price, costs)
            .spendable(state.cash - reserved, c.entry_price),
        Side::Short => state.cash,
    };
    compute_size(
        c.side,
        c.entry_price,
        state.equity(),
        funding,
        &effective,
        c.requested_size,
        stop_pct,
    )
}

/// Fund `scheduled` at `size` units.
pub(crate) fn open(
    state: &mut PortfolioState,
    scheduled: Scheduled,
    size: u64,
    costs: &CostsConfig,
) -> OpenTrade {
    let c = &scheduled.candidate;
    state.open_position(&c.symbol, c.side, size, c.entry_price);
    let reserve = match c.side {
        Side::Long => CostReserve::for_entry(c.entry_price, costs).total(size),
        Side::Short => 0.0,
    };
    OpenTrade {
        scheduled,
        size,
        reserve,
    }
}

/// Exit `trade`, book its costs and return the ledger row.
pub(crate) fn close(state: &mut PortfolioState, trade: OpenTrade, costs: &CostsConfig) -> ExecutedTrade {
    let OpenTrade { scheduled, size, .. } = trade;
    let c = scheduled.candidate;
    let breakdown = apply_costs(&c, size, costs);
    state.close_position(&c.symbol, c.side, size, c.exit_price, breakdown.total_costs());

    let entry_notional = c.entry_price * size as f64;
    let pnl_pct = if entry_notional > 0.0 {
        breakdown.net_pnl / entry_notional * 100.0
    } else {
        0.0
    };

    ExecutedTrade {
        symbol: c.symbol,
        side: c.side,
        product_type: breakdown.product_type,
        entry_timestamp: c.entry_timestamp,
        entry_price: c.entry_price,
        exit_timestamp: c.exit_timestamp,
        exit_price: c.exit_price,
        entry_reason: c.entry_reason,
        exit_reason: c.exit_reason,
        requested_size: c.requested_size,
        size,
        gross_pnl: breakdown.gross_pnl,
        commission: breakdown.commission,
        slippage: breakdown.slippage,
        other_charges: breakdown.other_charges,
        pnl: breakdown.net_pnl,
        pnl_pct,
        holding_period_bars: scheduled.exit_index.saturating_sub(scheduled.entry_index),
        max_theoretical_pnl: None,
        pnl_capture_ratio: None,
    }
}
