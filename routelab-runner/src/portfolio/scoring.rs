//! Candidate scoring for the portfolio router.
//!
//! Features are computed only from bars strictly before the entry bar, so a
//! score never sees the price it would be filled at.

use routelab_core::domain::{CandidateTrade, PriceSeries};
use routelab_core::indicators::true_range;

use crate::config::{ScorerKind, ScoringConfig};

/// Pre-entry features of one candidate. A field is `None` when there is not
/// enough history before the entry bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CandidateFeatures {
    /// `close[i-1] / close[i-1-L] - 1`.
    pub momentum: Option<f64>,
    /// Mean `close * volume` over up to `L` bars before entry.
    pub avg_dollar_volume: Option<f64>,
    /// Mean true range over the last `L` bars, divided by `close[i-1]`.
    pub atr_pct: Option<f64>,
}

/// Features for an entry at bar `entry_index` with a lookback of `lookback` bars.
pub fn compute_features(series: &PriceSeries, entry_index: usize, lookback: usize) -> CandidateFeatures {
    let history = &series.bars()[..entry_index.min(series.len())];
    let Some(prev) = history.last() else {
        return CandidateFeatures::default();
    };
    let lookback = lookback.max(1);

    let momentum = history
        .len()
        .checked_sub(1 + lookback)
        .map(|base| history[base].close)
        .filter(|base_close| *base_close > 0.0)
        .map(|base_close| prev.close / base_close - 1.0);

    let window = &history[history.len().saturating_sub(lookback)..];
    let avg_dollar_volume =
        Some(window.iter().map(|b| b.close * b.volume).sum::<f64>() / window.len() as f64);

    let atr_pct = if history.len() > lookback && prev.close > 0.0 {
        // One extra bar supplies the previous close of the oldest range.
        let tr = true_range(&history[history.len() - lookback - 1..]);
        let recent = &tr[1..];
        let atr = recent.iter().sum::<f64>() / lookback as f64;
        atr.is_finite().then(|| atr / prev.close)
    } else {
        None
    };

    CandidateFeatures {
        momentum,
        avg_dollar_volume,
        atr_pct,
    }
}

/// Ranks concurrent candidates; higher scores are funded first.
pub trait CandidateScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, candidate: &CandidateTrade, features: &CandidateFeatures) -> f64;
}

/// `w_m * direction * momentum + w_l * ln(1 + avg_dollar_volume) - w_v * atr_pct`.
///
/// Missing features contribute zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumLiquidityScorer {
    pub momentum_weight: f64,
    pub liquidity_weight: f64,
    pub volatility_weight: f64,
}

impl Default for MomentumLiquidityScorer {
    fn default() -> Self {
        Self {
            momentum_weight: 1.0,
            liquidity_weight: 0.05,
            volatility_weight: 1.0,
        }
    }
}

impl CandidateScorer for MomentumLiquidityScorer {
    fn name(&self) -> &'static str {
        "momentum_liquidity"
    }

    fn score(&self, candidate: &CandidateTrade, features: &CandidateFeatures) -> f64 {
        let momentum = features.momentum.unwrap_or(0.0) * candidate.side.direction();
        let liquidity = features.avg_dollar_volume.map_or(0.0, |v| v.max(0.0).ln_1p());
        let volatility = features.atr_pct.unwrap_or(0.0);
        self.momentum_weight * momentum + self.liquidity_weight * liquidity
            - self.volatility_weight * volatility
    }
}

/// Scores every candidate 0; ranking falls back to the tie-break order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlatScorer;

impl CandidateScorer for FlatScorer {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn score(&self, _candidate: &CandidateTrade, _features: &CandidateFeatures) -> f64 {
        0.0
    }
}

pub fn scorer_from_config(config: &ScoringConfig) -> Box<dyn CandidateScorer> {
    match config.scorer {
        ScorerKind::MomentumLiquidity => Box::new(MomentumLiquidityScorer {
            momentum_weight: config.momentum_weight,
            liquidity_weight: config.liquidity_weight,
            volatility_weight: config.volatility_weight,
        }),
        ScorerKind::Flat => Box::new(FlatScorer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use routelab_core::domain::{PriceBar, Side, UNBOUNDED_SIZE};

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn series(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                symbol: "WIPRO".into(),
                timestamp: day(i as u32 + 1),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100.0,
            })
            .collect();
        PriceSeries::new("WIPRO", bars).unwrap()
    }

    fn candidate(side: Side) -> CandidateTrade {
        CandidateTrade {
            symbol: "WIPRO".into(),
            side,
            requested_size: UNBOUNDED_SIZE,
            entry_timestamp: day(5),
            entry_price: 1_000.0,
            exit_timestamp: day(6),
            exit_price: 1_000.0,
            entry_reason: None,
            exit_reason: None,
        }
    }

    #[test]
    fn features_ignore_the_entry_bar() {
        let s = series(&[100.0, 102.0, 104.0, 110.0, 1_000.0, 1_000.0]);
        let f = compute_features(&s, 4, 2);
        // close[3] / close[1] - 1
        assert!((f.momentum.unwrap() - (110.0 / 102.0 - 1.0)).abs() < 1e-12);
        assert_eq!(f.avg_dollar_volume, Some((104.0 + 110.0) * 100.0 / 2.0));
        // TR of bars 2 and 3: max(2, |105-102|, |103-102|) = 3 and max(2, 7, 5) = 7.
        assert!((f.atr_pct.unwrap() - 5.0 / 110.0).abs() < 1e-12);
    }

    #[test]
    fn atr_uses_only_the_lookback_window() {
        let mut closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 100.0 } else { 300.0 }).collect();
        closes.extend([100.0; 8]);
        let s = series(&closes);
        let f = compute_features(&s, 28, 3);
        // Each of the last three bars ranges 99..101 around an unchanged close.
        assert_eq!(f.atr_pct, Some(0.02));
    }

    #[test]
    fn short_history_leaves_features_missing() {
        let s = series(&[100.0, 101.0, 102.0]);
        assert_eq!(compute_features(&s, 0, 20), CandidateFeatures::default());
        let f = compute_features(&s, 2, 20);
        assert!(f.momentum.is_none());
        assert!(f.atr_pct.is_none());
        assert!(f.avg_dollar_volume.is_some());
    }

    #[test]
    fn momentum_sign_follows_side() {
        let scorer = MomentumLiquidityScorer {
            liquidity_weight: 0.0,
            volatility_weight: 0.0,
            ..MomentumLiquidityScorer::default()
        };
        let f = CandidateFeatures {
            momentum: Some(0.1),
            ..CandidateFeatures::default()
        };
        assert!((scorer.score(&candidate(Side::Long), &f) - 0.1).abs() < 1e-12);
        assert!((scorer.score(&candidate(Side::Short), &f) + 0.1).abs() < 1e-12);
    }

    #[test]
    fn liquidity_and_volatility_terms() {
        let scorer = MomentumLiquidityScorer::default();
        let f = CandidateFeatures {
            momentum: None,
            avg_dollar_volume: Some(std::f64::consts::E - 1.0),
            atr_pct: Some(0.02),
        };
        assert!((scorer.score(&candidate(Side::Long), &f) - (0.05 - 0.02)).abs() < 1e-12);
    }

    #[test]
    fn scorer_selection() {
        let flat = scorer_from_config(&ScoringConfig {
            scorer: ScorerKind::Flat,
            ..ScoringConfig::default()
        });
        assert_eq!(flat.name(), "flat");
        assert_eq!(flat.score(&candidate(Side::Long), &CandidateFeatures::default()), 0.0);
        assert_eq!(scorer_from_config(&ScoringConfig::default()).name(), "momentum_liquidity");
    }
}
