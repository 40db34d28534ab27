//! Equal-weight buy-and-hold benchmark.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

use routelab_core::domain::{CurvePoint, PriceSeries};

/// Value of an equal-weight basket over the union of bar timestamps.
///
/// Capital is split equally across the symbols trading at the first
/// timestamp. When another symbol's first bar appears, the basket is
/// re-split equally across the enlarged set at that bar's prices. Units are
/// fractional and values are taken at closes. Symbols without bars are
/// ignored; an empty universe gives an empty curve.
pub fn equal_weight_benchmark(
    series_by_symbol: &BTreeMap<String, PriceSeries>,
    initial_capital: f64,
) -> Vec<CurvePoint> {
    let timeline: BTreeSet<NaiveDateTime> = series_by_symbol
        .values()
        .flat_map(|s| s.bars().iter().map(|b| b.timestamp))
        .collect();

    let mut cursors: BTreeMap<&str, usize> = BTreeMap::new();
    let mut last_close: BTreeMap<&str, f64> = BTreeMap::new();
    let mut units: BTreeMap<&str, f64> = BTreeMap::new();
    let mut curve = Vec::with_capacity(timeline.len());

    for &t in &timeline {
        let mut joined = false;
        for (symbol, series) in series_by_symbol {
            let cursor = cursors.entry(symbol.as_str()).or_insert(0);
            if let Some(bar) = series.bars().get(*cursor) {
                if bar.timestamp == t {
                    *cursor += 1;
                    last_close.insert(symbol.as_str(), bar.close);
                    if !units.contains_key(symbol.as_str()) && bar.close > 0.0 {
                        units.insert(symbol.as_str(), 0.0);
                        joined = true;
                    }
                }
            }
        }

        if joined {
            let value = if curve.is_empty() {
                initial_capital
            } else {
                basket_value(&units, &last_close)
            };
            let share = value / units.len() as f64;
            for (symbol, u) in units.iter_mut() {
                let price = last_close.get(symbol).copied().unwrap_or(0.0);
                *u = if price > 0.0 { share / price } else { 0.0 };
            }
        }

        let value = if units.is_empty() {
            initial_capital
        } else {
            basket_value(&units, &last_close)
        };
        curve.push(CurvePoint { timestamp: t, value });
    }
    curve
}

fn basket_value(units: &BTreeMap<&str, f64>, last_close: &BTreeMap<&str, f64>) -> f64 {
    units
        .iter()
        .map(|(s, u)| u * last_close.get(s).copied().unwrap_or(0.0))
        .sum()
}
