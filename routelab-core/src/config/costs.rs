//! Trading cost configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ConfigError};

/// Broker product classification of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// MIS: must close the same trading day.
    Intraday,
    /// CNC: may be carried overnight, long only.
    Delivery,
}

/// Configured product type; `Auto` classifies each trade by its dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductSetting {
    Intraday,
    Delivery,
    #[default]
    Auto,
}

/// Commission schedule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase", deny_unknown_fields)]
pub enum CommissionModel {
    #[default]
    None,
    /// Fixed fee per executed order, charged on entry and on exit.
    Flat { fee: f64 },
    /// Percentage of each leg's notional.
    Percent { rate_pct: f64 },
}

impl CommissionModel {
    pub fn name(&self) -> &'static str {
        match self {
            CommissionModel::None => "none",
            CommissionModel::Flat { .. } => "flat",
            CommissionModel::Percent { .. } => "percent",
        }
    }
}

/// Costs applied to every executed trade of a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostsConfig {
    #[serde(default)]
    pub product_type: ProductSetting,
    #[serde(default)]
    pub commission: CommissionModel,
    /// Adverse price adjustment per share on each leg.
    #[serde(default)]
    pub slippage_per_share: f64,
    /// Taxes and exchange fees as a percentage of round-trip turnover.
    #[serde(default)]
    pub other_charges_pct: f64,
}

impl CostsConfig {
    /// A configuration that charges nothing.
    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.commission {
            CommissionModel::None => {}
            CommissionModel::Flat { fee } => ensure_non_negative("commission.fee", fee)?,
            CommissionModel::Percent { rate_pct } => {
                ensure_non_negative("commission.rate_pct", rate_pct)?
            }
        }
        ensure_non_negative("slippage_per_share", self.slippage_per_share)?;
        ensure_non_negative("other_charges_pct", self.other_charges_pct)?;
        if self.proportional_rate_pct() > 100.0 {
            return Err(ConfigError::Invalid {
                field: "other_charges_pct",
                reason: "percent commission plus other charges must not exceed 100%".to_string(),
            });
        }
        Ok(())
    }

    /// Percentage of each leg's notional charged by the percent commission
    /// and other charges together.
    pub fn proportional_rate_pct(&self) -> f64 {
        let commission = match self.commission {
            CommissionModel::Percent { rate_pct } => rate_pct,
            _ => 0.0,
        };
        commission + self.other_charges_pct
    }
}
