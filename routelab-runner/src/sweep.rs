//! Parameter sweeps over a strategy's numeric parameters.
//!
//! Every grid point is an independent backtest, so points run in parallel
//! with rayon. Output order follows the grid order regardless of scheduling.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use routelab_core::domain::PriceSeries;
use routelab_core::signals::{StrategyParams, StrategyRegistry};
use routelab_core::BacktestError;

use crate::config::SimulationSetup;
use crate::metrics::MetricsReport;
use crate::runner::{run_portfolio_backtest, run_single_backtest};

/// Cartesian grid of parameter values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    axes: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one axis.
    pub fn axis(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.axes.insert(name.into(), values);
        self
    }

    /// Number of grid points; an empty grid has one point (the base params).
    pub fn size(&self) -> usize {
        self.axes.values().map(Vec::len).product()
    }

    /// Every grid point layered over `base`, in lexicographic axis order.
    pub fn combinations(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        let mut points = vec![base.clone()];
        for (name, values) in &self.axes {
            points = points
                .iter()
                .flat_map(|p| {
                    values.iter().map(move |&v| {
                        let mut next = p.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub params: StrategyParams,
    pub metrics: MetricsReport,
    pub trade_count: usize,
    pub fingerprint: String,
}

/// Backtest every valid grid point.
///
/// Points the strategy rejects (for example `fast >= slow`) are skipped.
/// A single-entry universe runs the single-symbol engine; anything larger
/// goes through the portfolio router.
pub fn run_sweep(
    registry: &StrategyRegistry,
    code: &str,
    base: &StrategyParams,
    grid: &ParamGrid,
    series_by_symbol: &BTreeMap<String, PriceSeries>,
    setup: &SimulationSetup,
) -> Result<Vec<SweepOutcome>, BacktestError> {
    let generator = registry.get(code)?;
    let points: Vec<StrategyParams> = grid
        .combinations(base)
        .into_iter()
        .filter(|p| match generator.validate(p) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "skipping grid point");
                false
            }
        })
        .collect();
    info!(strategy = code, points = points.len(), grid = grid.size(), "starting sweep");

    let single = match series_by_symbol.values().next() {
        Some(series) if series_by_symbol.len() == 1 => Some(series),
        _ => None,
    };

    points
        .par_iter()
        .map(|params| {
            let result = match single {
                Some(series) => run_single_backtest(registry, code, params, series, setup)?,
                None => run_portfolio_backtest(registry, code, params, series_by_symbol, setup)?,
            };
            Ok(SweepOutcome {
                params: params.clone(),
                trade_count: result.trades.len(),
                fingerprint: result.fingerprint(),
                metrics: result.metrics,
            })
        })
        .collect()
}
