//! Risk configuration: position limits, per-trade risk and default stops.

use serde::{Deserialize, Serialize};

use super::costs::ProductType;
use crate::error::{ensure_non_negative, ensure_positive, ConfigError};

fn default_max_position_size_pct() -> f64 {
    100.0
}

fn default_per_trade_risk_pct() -> f64 {
    1.0
}

fn default_atr_period() -> usize {
    14
}

/// Risk limits for one run. Immutable once the run starts.
///
/// All percentages are in percent units (`25.0` means 25%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    /// Maximum notional of one position as a percentage of equity.
    #[serde(default = "default_max_position_size_pct")]
    pub max_position_size_pct: f64,
    /// Equity put at risk per trade when a default stop is active.
    #[serde(default = "default_per_trade_risk_pct")]
    pub per_trade_risk_pct: f64,
    #[serde(default)]
    pub allow_short_selling: bool,
    /// Fixed default stop distance, percent of entry price.
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    /// ATR-multiple default stop distance.
    #[serde(default)]
    pub stop_loss_atr_mult: Option<f64>,
    /// ATR lookback used by the ATR stop.
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    #[serde(default)]
    pub take_profit_pct: Option<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size_pct: default_max_position_size_pct(),
            per_trade_risk_pct: default_per_trade_risk_pct(),
            allow_short_selling: false,
            stop_loss_pct: None,
            stop_loss_atr_mult: None,
            atr_period: default_atr_period(),
            take_profit_pct: None,
        }
    }
}

/// The active default-stop mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopRule {
    None,
    Percent(f64),
    AtrMultiple { mult: f64, period: usize },
}

impl StopRule {
    pub fn is_active(&self) -> bool {
        !matches!(self, StopRule::None)
    }
}

impl RiskConfig {
    /// Validate every field. Called before any simulation starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("max_position_size_pct", self.max_position_size_pct)?;
        ensure_non_negative("per_trade_risk_pct", self.per_trade_risk_pct)?;
        if self.stop_loss_pct.is_some() && self.stop_loss_atr_mult.is_some() {
            return Err(ConfigError::ConflictingStops);
        }
        if let Some(pct) = self.stop_loss_pct {
            ensure_positive("stop_loss_pct", pct)?;
        }
        if let Some(mult) = self.stop_loss_atr_mult {
            ensure_positive("stop_loss_atr_mult", mult)?;
            if self.atr_period == 0 {
                return Err(ConfigError::NonPositive {
                    field: "atr_period",
                    value: 0.0,
                });
            }
        }
        if let Some(pct) = self.take_profit_pct {
            ensure_positive("take_profit_pct", pct)?;
        }
        if self.stop_rule().is_active() {
            ensure_positive("per_trade_risk_pct", self.per_trade_risk_pct)?;
        }
        Ok(())
    }

    pub fn stop_rule(&self) -> StopRule {
        match (self.stop_loss_pct, self.stop_loss_atr_mult) {
            (Some(pct), _) => StopRule::Percent(pct),
            (None, Some(mult)) => StopRule::AtrMultiple {
                mult,
                period: self.atr_period,
            },
            (None, None) => StopRule::None,
        }
    }

    /// Effective limits for a trade of the given product type.
    ///
    /// Delivery (CNC) trades may not carry short exposure overnight, so short
    /// selling is forced off for them.
    pub fn for_product(&self, product: ProductType) -> RiskConfig {
        let mut effective = self.clone();
        if product == ProductType::Delivery {
            effective.allow_short_selling = false;
        }
        effective
    }
}
