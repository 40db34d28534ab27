//! SMA crossover: long on a golden cross, flat (or short) on a death cross.
//!
//! Params: `fast` (10), `slow` (30), `allow_short` (0), `quantity` (unset).
//! Fills happen at the close of the crossing bar.

use super::{
    check_flag, check_quantity, invalid, walk_events, EventLabels, SignalGenerator,
    StrategyParams,
};
use crate::domain::{CandidateTrade, PriceSeries, Side};
use crate::error::ConfigError;
use crate::indicators::{Indicator, IndicatorValues, NamedSeries, Sma};

const DEFAULT_FAST: usize = 10;
const DEFAULT_SLOW: usize = 30;

const LABELS: EventLabels = EventLabels {
    bullish: "golden_cross",
    bearish: "death_cross",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SmaCrossover;

impl SmaCrossover {
    fn periods(params: &StrategyParams) -> (usize, usize) {
        (
            params.param_usize("fast", DEFAULT_FAST),
            params.param_usize("slow", DEFAULT_SLOW),
        )
    }

    fn averages(series: &PriceSeries, params: &StrategyParams) -> (Vec<f64>, Vec<f64>) {
        let (fast, slow) = Self::periods(params);
        (
            Sma::new(fast).compute(series.bars()),
            Sma::new(slow).compute(series.bars()),
        )
    }
}

/// Per-bar crossover events of `fast` against `slow`.
///
/// Golden cross: fast > slow now and fast <= slow on the previous bar.
pub(crate) fn crossover_events(fast: &[f64], slow: &[f64]) -> Vec<Option<Side>> {
    let n = fast.len().min(slow.len());
    let mut events = vec![None; n];
    for i in 1..n {
        let (fc, sc, fp, sp) = (fast[i], slow[i], fast[i - 1], slow[i - 1]);
        if fc.is_nan() || sc.is_nan() || fp.is_nan() || sp.is_nan() {
            continue;
        }
        if fc > sc && fp <= sp {
            events[i] = Some(Side::Long);
        } else if fc < sc && fp >= sp {
            events[i] = Some(Side::Short);
        }
    }
    events
}

impl SignalGenerator for SmaCrossover {
    fn code(&self) -> &'static str {
        "sma_crossover"
    }

    fn min_bars(&self, params: &StrategyParams) -> usize {
        let (_, slow) = Self::periods(params);
        slow + 1
    }

    fn validate(&self, params: &StrategyParams) -> Result<(), ConfigError> {
        let (fast, slow) = Self::periods(params);
        if fast == 0 {
            return Err(invalid("fast", "must be at least 1"));
        }
        if slow <= fast {
            return Err(invalid(
                "slow",
                format!("must be greater than fast ({slow} <= {fast})"),
            ));
        }
        check_flag(params, "allow_short")?;
        check_quantity(params)
    }

    fn generate(&self, series: &PriceSeries, params: &StrategyParams) -> Vec<CandidateTrade> {
        if series.len() < self.min_bars(params) {
            return Vec::new();
        }
        let (fast, slow) = Self::averages(series, params);
        let events = crossover_events(&fast, &slow);
        walk_events(
            series,
            &events,
            params.flag("allow_short"),
            params.requested_size(),
            LABELS,
        )
    }

    fn overlays(&self, series: &PriceSeries, params: &StrategyParams) -> NamedSeries {
        let (fast, slow) = Self::averages(series, params);
        let mut values = IndicatorValues::new();
        values.insert("sma_fast", fast);
        values.insert("sma_slow", slow);
        values.to_named_series(series.bars())
    }
}
