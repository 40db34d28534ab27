//! Cost model: product classification, commission, slippage and charges.
//!
//! Slippage is an adverse price adjustment on each leg; it is reported as a
//! separate cost line so `gross_pnl` stays on raw candidate prices.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::{CommissionModel, CostsConfig, ProductSetting, ProductType};
use crate::domain::CandidateTrade;

/// Realised result of one round trip at a given size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub product_type: ProductType,
    pub gross_pnl: f64,
    pub commission: f64,
    pub slippage: f64,
    pub other_charges: f64,
    pub net_pnl: f64,
}

impl CostBreakdown {
    pub fn total_costs(&self) -> f64 {
        self.commission + self.slippage + self.other_charges
    }
}

/// Cash a long entry must leave untouched so its round trip can be paid.
///
/// Costs are booked at exit, so the reserve covers everything known at
/// entry: both flat fees, both slippage legs and the proportional charges on
/// the entry notional. Proportional charges on the exit leg are paid out of
/// the exit proceeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostReserve {
    pub fixed: f64,
    pub per_unit: f64,
}

impl CostReserve {
    pub fn for_entry(entry_price: f64, costs: &CostsConfig) -> Self {
        let fixed = match costs.commission {
            CommissionModel::Flat { fee } => fee * 2.0,
            _ => 0.0,
        };
        let per_unit =
            entry_price * costs.proportional_rate_pct() / 100.0 + costs.slippage_per_share * 2.0;
        Self { fixed, per_unit }
    }

    pub fn total(&self, size: u64) -> f64 {
        if size == 0 {
            0.0
        } else {
            self.fixed + self.per_unit * size as f64
        }
    }

    /// Cash to size a long against: buying `floor(result / entry_price)`
    /// units leaves at least their reserve behind in `cash`.
    pub fn spendable(&self, cash: f64, entry_price: f64) -> f64 {
        let free = cash - self.fixed;
        if free <= 0.0 || entry_price <= 0.0 {
            return 0.0;
        }
        if self.per_unit == 0.0 {
            return free;
        }
        free * entry_price / (entry_price + self.per_unit)
    }
}

/// Intraday iff entry and exit share a calendar date under `Auto`.
pub fn resolve_product(
    setting: ProductSetting,
    entry: NaiveDateTime,
    exit: NaiveDateTime,
) -> ProductType {
    match setting {
        ProductSetting::Intraday => ProductType::Intraday,
        ProductSetting::Delivery => ProductType::Delivery,
        ProductSetting::Auto if entry.date() == exit.date() => ProductType::Intraday,
        ProductSetting::Auto => ProductType::Delivery,
    }
}

/// Round-trip costs of `candidate` filled at `size` units.
pub fn apply_costs(candidate: &CandidateTrade, size: u64, costs: &CostsConfig) -> CostBreakdown {
    let product_type = resolve_product(
        costs.product_type,
        candidate.entry_timestamp,
        candidate.exit_timestamp,
    );
    if size == 0 {
        return CostBreakdown {
            product_type,
            gross_pnl: 0.0,
            commission: 0.0,
            slippage: 0.0,
            other_charges: 0.0,
            net_pnl: 0.0,
        };
    }

    let qty = size as f64;
    let entry_notional = candidate.entry_price * qty;
    let exit_notional = candidate.exit_price * qty;
    let turnover = entry_notional + exit_notional;

    let gross_pnl = candidate.side.direction() * (candidate.exit_price - candidate.entry_price) * qty;
    let commission = match costs.commission {
        CommissionModel::None => 0.0,
        CommissionModel::Flat { fee } => fee * 2.0,
        CommissionModel::Percent { rate_pct } => rate_pct / 100.0 * turnover,
    };
    let slippage = costs.slippage_per_share * qty * 2.0;
    let other_charges = costs.other_charges_pct / 100.0 * turnover;

    CostBreakdown {
        product_type,
        gross_pnl,
        commission,
        slippage,
        other_charges,
        net_pnl: gross_pnl - commission - slippage - other_charges,
    }
}
