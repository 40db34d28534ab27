//! Fill-level mechanics: round-trip costs and bracket exits.

pub mod brackets;
pub mod cost_model;

pub use brackets::{apply_bracket_exits, STOP_LOSS, TAKE_PROFIT};
pub use cost_model::{apply_costs, resolve_product, CostBreakdown, CostReserve};
