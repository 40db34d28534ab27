//! Zero-lag EMA: EMA of `close + (close - close[lag])`, lag = (period - 1) / 2.
//!
//! Lookback: lag + period - 1.

use super::{ema_of_series, Indicator};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Zlema {
    period: usize,
    name: String,
}

impl Zlema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("zlema_{period}"),
        }
    }

    pub fn lag(&self) -> usize {
        (self.period - 1) / 2
    }
}

impl Indicator for Zlema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.lag() + self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let lag = self.lag();
        let de_lagged: Vec<f64> = bars
            .iter()
            .enumerate()
            .map(|(i, b)| {
                if i < lag {
                    f64::NAN
                } else {
                    b.close + (b.close - bars[i - lag].close)
                }
            })
            .collect();
        ema_of_series(&de_lagged, self.period)
    }
}

/// Highest value over the trailing `window` values. `NaN` until a full window
/// of valid values is available.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn zlema_lookback() {
        let z = Zlema::new(5);
        assert_eq!(z.lag(), 2);
        assert_eq!(z.lookback(), 6);
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let values = z.compute(&bars);
        assert!(values[5].is_nan());
        assert!(values[6].is_finite());
    }

    #[test]
    fn zlema_on_linear_trend_tracks_price() {
        // On a straight line the de-lagged input leads price by `lag` steps,
        // and the EMA lag cancels it out once warmed up.
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let values = Zlema::new(5).compute(&bars);
        assert_approx(values[59], closes[59], 1e-6);
    }

    #[test]
    fn rolling_max_window() {
        let values = [f64::NAN, 3.0, 1.0, 4.0, 2.0];
        let result = rolling_max(&values, 2);
        assert!(result[1].is_nan());
        assert_approx(result[2], 3.0, DEFAULT_EPSILON);
        assert_approx(result[3], 4.0, DEFAULT_EPSILON);
        assert_approx(result[4], 4.0, DEFAULT_EPSILON);
    }
}
