//! Run-level risk and cost configuration.

pub mod costs;
pub mod risk;

pub use costs::{CommissionModel, CostsConfig, ProductSetting, ProductType};
pub use risk::{RiskConfig, StopRule};
