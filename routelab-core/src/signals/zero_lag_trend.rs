//! Zero-lag trend: volatility band breakout around a zero-lag EMA.
//!
//! Params: `length` (70), `band_mult` (1.2), `allow_short` (0), `quantity`.
//!
//! Band width is the highest ATR(length) over the last `3 * length` bars,
//! times `band_mult`. The trend turns bullish when the close crosses above
//! `zlema + width` and bearish when it crosses below `zlema - width`; trades
//! open and close on trend flips.

use super::{
    check_flag, check_quantity, invalid, walk_events, EventLabels, SignalGenerator,
    StrategyParams,
};
use crate::domain::{CandidateTrade, PriceSeries, Side};
use crate::error::ConfigError;
use crate::indicators::{rolling_max, Atr, Indicator, IndicatorValues, NamedSeries, Zlema};

const DEFAULT_LENGTH: usize = 70;
const DEFAULT_BAND_MULT: f64 = 1.2;

const LABELS: EventLabels = EventLabels {
    bullish: "trend_up",
    bearish: "trend_down",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroLagTrend;

struct Bands {
    zlema: Vec<f64>,
    upper: Vec<f64>,
    lower: Vec<f64>,
}

impl ZeroLagTrend {
    fn length(params: &StrategyParams) -> usize {
        params.param_usize("length", DEFAULT_LENGTH)
    }

    fn bands(series: &PriceSeries, params: &StrategyParams) -> Bands {
        let length = Self::length(params).max(1);
        let mult = params.param("band_mult", DEFAULT_BAND_MULT);
        let bars = series.bars();

        let zlema = Zlema::new(length).compute(bars);
        let atr = Atr::new(length).compute(bars);
        let width: Vec<f64> = rolling_max(&atr, 3 * length)
            .into_iter()
            .map(|w| w * mult)
            .collect();

        let upper = zlema.iter().zip(&width).map(|(z, w)| z + w).collect();
        let lower = zlema.iter().zip(&width).map(|(z, w)| z - w).collect();
        Bands {
            zlema,
            upper,
            lower,
        }
    }
}

/// Trend state per bar (`NaN` before the bands exist, then 0 until the first
/// breakout) and the flip events.
fn trend_states(closes: &[f64], bands: &Bands) -> (Vec<f64>, Vec<Option<Side>>) {
    let n = closes.len();
    let mut trend = vec![f64::NAN; n];
    let mut events = vec![None; n];
    let mut state = 0.0;

    for i in 0..n {
        if bands.upper[i].is_nan() || bands.lower[i].is_nan() {
            continue;
        }
        if i > 0 && !bands.upper[i - 1].is_nan() {
            let crossed_up = closes[i] > bands.upper[i] && closes[i - 1] <= bands.upper[i - 1];
            let crossed_down = closes[i] < bands.lower[i] && closes[i - 1] >= bands.lower[i - 1];
            if crossed_up && state != 1.0 {
                state = 1.0;
                events[i] = Some(Side::Long);
            } else if crossed_down && state != -1.0 {
                state = -1.0;
                events[i] = Some(Side::Short);
            }
        }
        trend[i] = state;
    }
    (trend, events)
}

impl SignalGenerator for ZeroLagTrend {
    fn code(&self) -> &'static str {
        "zero_lag_trend"
    }

    fn min_bars(&self, params: &StrategyParams) -> usize {
        // ATR valid from `length`, its rolling max from `4 * length - 1`,
        // plus one bar to detect a cross.
        4 * Self::length(params) + 1
    }

    fn validate(&self, params: &StrategyParams) -> Result<(), ConfigError> {
        if Self::length(params) < 2 {
            return Err(invalid("length", "must be at least 2"));
        }
        let mult = params.param("band_mult", DEFAULT_BAND_MULT);
        if !mult.is_finite() || mult <= 0.0 {
            return Err(invalid("band_mult", format!("must be positive, got {mult}")));
        }
        check_flag(params, "allow_short")?;
        check_quantity(params)
    }

    fn generate(&self, series: &PriceSeries, params: &StrategyParams) -> Vec<CandidateTrade> {
        if series.len() < self.min_bars(params) {
            return Vec::new();
        }
        let bands = Self::bands(series, params);
        let (_, events) = trend_states(&series.closes(), &bands);
        walk_events(
            series,
            &events,
            params.flag("allow_short"),
            params.requested_size(),
            LABELS,
        )
    }

    fn overlays(&self, series: &PriceSeries, params: &StrategyParams) -> NamedSeries {
        let bands = Self::bands(series, params);
        let (trend, _) = trend_states(&series.closes(), &bands);
        let mut values = IndicatorValues::new();
        values.insert("zlema", bands.zlema);
        values.insert("upper_band", bands.upper);
        values.insert("lower_band", bands.lower);
        values.insert("trend", trend);
        values.to_named_series(series.bars())
    }
}
