//! RouteLab Core: domain types, risk/cost configuration, indicators,
//! signal generators, order sizing and the cost model.
//!
//! Everything here is pure: no I/O, no clocks, no shared mutable state.
//! - Domain types (bars, price series, candidate/executed trades, equity points, portfolio state)
//! - Risk and cost configuration with fail-fast validation
//! - Indicators and the strategy registry
//! - Order sizing policy, cost model and bracket exits
//! - Timeframe labels and annualization

pub mod config;
pub mod domain;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod signals;
pub mod sizing;
pub mod timeframe;

pub use error::{BacktestError, ConfigError, Phase};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the parallel runner are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::CandidateTrade>();
        require_sync::<domain::CandidateTrade>();
        require_send::<domain::ExecutedTrade>();
        require_sync::<domain::ExecutedTrade>();
        require_send::<domain::PortfolioState>();
        require_sync::<domain::PortfolioState>();

        require_send::<config::RiskConfig>();
        require_sync::<config::RiskConfig>();
        require_send::<config::CostsConfig>();
        require_sync::<config::CostsConfig>();

        require_send::<signals::StrategyRegistry>();
        require_sync::<signals::StrategyRegistry>();
        require_send::<signals::StrategyParams>();
        require_sync::<signals::StrategyParams>();
        require_send::<indicators::IndicatorValues>();
        require_sync::<indicators::IndicatorValues>();

        require_send::<BacktestError>();
        require_sync::<BacktestError>();
    }

    /// Generators only ever see a price series and parameters.
    #[test]
    fn signal_generator_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            sig: &dyn signals::SignalGenerator,
            series: &domain::PriceSeries,
            params: &signals::StrategyParams,
        ) -> Vec<domain::CandidateTrade> {
            sig.generate(series, params)
        }
    }
}
