//! PortfolioState: the one mutable aggregate of a simulation run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::trade::Side;

/// Cash, signed positions and last seen prices for a single run.
///
/// The accounting identity `equity == cash + sum(position * last_price)` holds
/// after every mutation. Ordered maps keep iteration (and therefore every
/// float summation) deterministic across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub positions: BTreeMap<String, i64>,
    pub last_prices: BTreeMap<String, f64>,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            positions: BTreeMap::new(),
            last_prices: BTreeMap::new(),
        }
    }

    /// Record the latest known price for `symbol`.
    pub fn mark(&mut self, symbol: &str, price: f64) {
        if let Some(p) = self.last_prices.get_mut(symbol) {
            *p = price;
        } else {
            self.last_prices.insert(symbol.to_string(), price);
        }
    }

    /// Mark-to-market value of all open positions.
    pub fn exposure(&self) -> f64 {
        self.positions
            .iter()
            .map(|(sym, &qty)| qty as f64 * self.last_prices.get(sym).copied().unwrap_or(0.0))
            .sum()
    }

    /// Total equity = cash + open position value.
    pub fn equity(&self) -> f64 {
        self.cash + self.exposure()
    }

    /// Signed open size for `symbol` (0 when flat).
    pub fn position(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    /// Apply an entry fill: longs pay the notional, shorts receive it.
    pub fn open_position(&mut self, symbol: &str, side: Side, size: u64, price: f64) {
        if size == 0 {
            return;
        }
        let notional = size as f64 * price;
        match side {
            Side::Long => self.cash -= notional,
            Side::Short => self.cash += notional,
        }
        self.adjust(symbol, side.signed(size));
        if !self.last_prices.contains_key(symbol) {
            self.mark(symbol, price);
        }
    }

    /// Apply an exit fill at `price` and deduct the round trip's total costs.
    ///
    /// Over a full round trip the cash delta equals the trade's net PnL.
    pub fn close_position(&mut self, symbol: &str, side: Side, size: u64, price: f64, costs: f64) {
        if size == 0 {
            return;
        }
        let notional = size as f64 * price;
        match side {
            Side::Long => self.cash += notional,
            Side::Short => self.cash -= notional,
        }
        self.cash -= costs;
        self.adjust(symbol, -side.signed(size));
    }

    /// Non-flat positions, ordered by symbol.
    pub fn holdings(&self) -> BTreeMap<String, i64> {
        self.positions
            .iter()
            .filter(|(_, &q)| q != 0)
            .map(|(s, &q)| (s.clone(), q))
            .collect()
    }

    fn adjust(&mut self, symbol: &str, delta: i64) {
        let entry = self.positions.entry(symbol.to_string()).or_insert(0);
        *entry += delta;
        if *entry == 0 {
            self.positions.remove(symbol);
        }
    }
}
