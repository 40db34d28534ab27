//! Look-ahead contamination tests for indicators and signal generators.
//!
//! Method: compute on a truncated series and on the full series and assert the
//! overlapping prefix is identical. Any difference means future bars leak into
//! past values.

use chrono::NaiveDate;
use routelab_core::domain::{PriceBar, PriceSeries};
use routelab_core::indicators::{Atr, Ema, Indicator, Sma, Zlema};
use routelab_core::signals::{StrategyParams, StrategyRegistry};

/// Deterministic pseudo-random walk.
fn make_test_bars(n: usize) -> Vec<PriceBar> {
    let base = NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.05;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        bars.push(PriceBar {
            symbol: "NIFTYBEES".to_string(),
            timestamp: base + chrono::Duration::days(i as i64),
            open,
            high: open.max(close) + 2.0,
            low: open.min(close) - 2.0,
            close,
            volume: 1000.0 + i as f64 * 100.0,
        });
    }
    bars
}

fn assert_no_lookahead(indicator: &dyn Indicator, full: &[PriceBar], cut: usize) {
    let full_result = indicator.compute(full);
    let truncated_result = indicator.compute(&full[..cut]);
    assert_eq!(truncated_result.len(), cut);

    for i in 0..cut {
        let (a, b) = (truncated_result[i], full_result[i]);
        assert!(
            (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-10,
            "{}: bar {i} differs (truncated={a}, full={b})",
            indicator.name()
        );
    }
}

#[test]
fn indicators_have_no_lookahead() {
    let bars = make_test_bars(400);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(20)),
        Box::new(Ema::new(20)),
        Box::new(Atr::new(14)),
        Box::new(Zlema::new(21)),
    ];
    for indicator in &indicators {
        assert_no_lookahead(indicator.as_ref(), &bars, 200);
    }
}

#[test]
fn generators_have_no_lookahead_on_entries() {
    let bars = make_test_bars(400);
    let full = PriceSeries::new("NIFTYBEES", bars.clone()).unwrap();
    let cut = 250;
    let truncated = PriceSeries::new("NIFTYBEES", bars[..cut].to_vec()).unwrap();
    let cut_ts = bars[cut - 1].timestamp;

    let registry = StrategyRegistry::with_builtins();
    let cases = [
        (
            "sma_crossover",
            StrategyParams::new()
                .with("fast", 5.0)
                .with("slow", 20.0)
                .with("allow_short", 1.0),
        ),
        (
            "zero_lag_trend",
            StrategyParams::new()
                .with("length", 10.0)
                .with("band_mult", 0.3)
                .with("allow_short", 1.0),
        ),
    ];

    for (code, params) in cases {
        let generator = registry.get(code).unwrap();
        let entries = |series: &PriceSeries| -> Vec<_> {
            generator
                .generate(series, &params)
                .into_iter()
                .filter(|t| t.entry_timestamp < cut_ts)
                .map(|t| (t.side, t.entry_timestamp, t.entry_price))
                .collect()
        };
        assert_eq!(entries(&truncated), entries(&full), "{code} entries differ");
    }
}
