//! Domain types for RouteLab

pub mod bar;
pub mod equity;
pub mod portfolio;
pub mod trade;

pub use bar::{BarError, PriceBar, PriceSeries};
pub use equity::{equity_values, CurvePoint, EquityPoint};
pub use portfolio::PortfolioState;
pub use trade::{CandidateTrade, ExecutedTrade, Side, UNBOUNDED_SIZE};

/// Symbol type alias
pub type Symbol = String;
