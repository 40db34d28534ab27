//! RouteLab Runner: backtest orchestration on top of `routelab-core`.
//!
//! This crate provides:
//! - The single-symbol engine and the capital-aware portfolio router
//! - Metrics, the what-if annotation and the equal-weight benchmark
//! - TOML run configuration and CSV bar loading
//! - JSON/CSV/Markdown artifacts and result fingerprinting
//! - Parallel candidate generation and parameter sweeps

pub mod benchmark;
pub mod config;
pub mod data_loader;
pub mod export;
mod ledger;
pub mod metrics;
pub mod portfolio;
pub mod result;
pub mod runner;
pub mod single;
pub mod sweep;

pub use benchmark::equal_weight_benchmark;
pub use config::{
    AllocationConfig, ConfigFileError, MetricsConfig, RunConfig, RunMode, ScorerKind,
    ScoringConfig, SimulationSetup,
};
pub use data_loader::{load_symbol, load_universe, read_series, LoadError};
pub use export::{read_equity_csv, save_artifacts, write_equity_csv, write_trades_csv};
pub use metrics::{annotate_what_if, compute_metrics, MetricsReport, MetricsSettings};
pub use portfolio::{
    generate_portfolio_candidates, simulate_portfolio, CandidateScorer, FlatScorer,
    MomentumLiquidityScorer, PortfolioRun, RejectReason, RoutingDiagnostics,
};
pub use result::{BacktestResult, SymbolSummary, SCHEMA_VERSION};
pub use runner::{
    configured_universe, run_backtest, run_from_dir, run_portfolio_backtest, run_single_backtest,
    RunError,
};
pub use single::{run_single, SingleRun};
pub use sweep::{run_sweep, ParamGrid, SweepOutcome};
