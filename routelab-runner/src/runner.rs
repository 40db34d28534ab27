//! Backtest runner: wires signal generation, simulation, metrics, the
//! benchmark and strategy overlays into one `BacktestResult`.
//!
//! Entry points:
//! - `run_single_backtest()`: one symbol, one position at a time
//! - `run_portfolio_backtest()`: several symbols routed through one pool of
//!   capital
//! - `run_backtest()`: dispatch on a `RunConfig` over pre-loaded series
//! - `run_from_dir()`: load CSV files, then `run_backtest()`. Used by the CLI.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, info_span};

use routelab_core::domain::PriceSeries;
use routelab_core::indicators::NamedSeries;
use routelab_core::signals::{SignalGenerator, StrategyParams, StrategyRegistry};
use routelab_core::timeframe::Timeframe;
use routelab_core::{BacktestError, Phase};

use crate::benchmark::equal_weight_benchmark;
use crate::config::{ConfigFileError, RunConfig, RunMode, SimulationSetup};
use crate::data_loader::{load_universe, LoadError};
use crate::metrics::{annotate_what_if, compute_metrics};
use crate::portfolio::{generate_portfolio_candidates, scorer_from_config, simulate_portfolio};
use crate::result::{summarize_by_symbol, BacktestResult, SCHEMA_VERSION};
use crate::single::run_single;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Backtest(#[from] BacktestError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("config error: {0}")]
    Config(#[from] ConfigFileError),
}

fn prepare(
    registry: &StrategyRegistry,
    code: &str,
    params: &StrategyParams,
    setup: &SimulationSetup,
) -> Result<std::sync::Arc<dyn SignalGenerator>, BacktestError> {
    setup.validate()?;
    let generator = registry.get(code)?;
    generator.validate(params)?;
    Ok(generator)
}

/// Backtest one symbol.
pub fn run_single_backtest(
    registry: &StrategyRegistry,
    code: &str,
    params: &StrategyParams,
    series: &PriceSeries,
    setup: &SimulationSetup,
) -> Result<BacktestResult, BacktestError> {
    let span = info_span!(
        "backtest",
        strategy = code,
        symbols = 1usize,
        capital = setup.initial_capital
    );
    let _enter = span.enter();

    let generator = prepare(registry, code, params, setup)?;
    if series.is_empty() {
        return Err(BacktestError::InsufficientData {
            symbol: series.symbol().to_string(),
            phase: Phase::Setup,
        });
    }

    let candidates = generator.generate(series, params);
    debug!(symbol = series.symbol(), candidates = candidates.len(), "generated candidates");
    let run = run_single(series, &candidates, setup)?;

    let universe: BTreeMap<String, PriceSeries> =
        [(series.symbol().to_string(), series.clone())].into_iter().collect();
    let mut trades = run.trades;
    annotate_what_if(&mut trades, &universe);
    let metrics = compute_metrics(&run.equity_curve, &trades, &setup.metrics);

    let mut indicators: BTreeMap<String, NamedSeries> = BTreeMap::new();
    indicators.insert(series.symbol().to_string(), generator.overlays(series, params));

    let result = BacktestResult {
        schema_version: SCHEMA_VERSION,
        strategy: code.to_string(),
        params: params.clone(),
        mode: RunMode::Single,
        symbols: vec![series.symbol().to_string()],
        timeframe: Timeframe::default(),
        initial_capital: setup.initial_capital,
        benchmark: equal_weight_benchmark(&universe, setup.initial_capital),
        per_symbol: summarize_by_symbol(&trades),
        equity_curve: run.equity_curve,
        trades,
        metrics,
        indicators,
        routing: None,
        excluded: Vec::new(),
    };
    info!(
        trades = result.trades.len(),
        skipped = run.skipped,
        final_value = result.final_value(),
        "backtest complete"
    );
    Ok(result)
}

/// Backtest a group of symbols through the capital-aware router.
pub fn run_portfolio_backtest(
    registry: &StrategyRegistry,
    code: &str,
    params: &StrategyParams,
    series_by_symbol: &BTreeMap<String, PriceSeries>,
    setup: &SimulationSetup,
) -> Result<BacktestResult, BacktestError> {
    let span = info_span!(
        "backtest",
        strategy = code,
        symbols = series_by_symbol.len(),
        capital = setup.initial_capital
    );
    let _enter = span.enter();

    let generator = prepare(registry, code, params, setup)?;
    let candidates = generate_portfolio_candidates(generator.as_ref(), params, series_by_symbol, setup)?;
    debug!(
        candidates = candidates.values().map(Vec::len).sum::<usize>(),
        "generated portfolio candidates"
    );

    let scorer = scorer_from_config(&setup.scoring);
    let run = simulate_portfolio(series_by_symbol, &candidates, setup, scorer.as_ref())?;

    let mut trades = run.trades;
    annotate_what_if(&mut trades, series_by_symbol);
    let metrics = compute_metrics(&run.equity_curve, &trades, &setup.metrics);

    let indicators: BTreeMap<String, NamedSeries> = series_by_symbol
        .iter()
        .filter(|(_, s)| !s.is_empty())
        .map(|(symbol, s)| (symbol.clone(), generator.overlays(s, params)))
        .collect();

    let result = BacktestResult {
        schema_version: SCHEMA_VERSION,
        strategy: code.to_string(),
        params: params.clone(),
        mode: RunMode::Portfolio,
        symbols: series_by_symbol.keys().cloned().collect(),
        timeframe: Timeframe::default(),
        initial_capital: setup.initial_capital,
        benchmark: equal_weight_benchmark(series_by_symbol, setup.initial_capital),
        per_symbol: summarize_by_symbol(&trades),
        equity_curve: run.equity_curve,
        trades,
        metrics,
        indicators,
        excluded: run.diagnostics.excluded.clone(),
        routing: Some(run.diagnostics),
    };
    info!(
        trades = result.trades.len(),
        excluded = result.excluded.len(),
        final_value = result.final_value(),
        "backtest complete"
    );
    Ok(result)
}

/// The configured symbols, each cut to the configured date range.
///
/// Symbols missing from `series_by_symbol` map to an empty series.
pub fn configured_universe(
    config: &RunConfig,
    series_by_symbol: &BTreeMap<String, PriceSeries>,
) -> BTreeMap<String, PriceSeries> {
    let (start, end) = config.date_range();
    config
        .run
        .symbols
        .iter()
        .map(|symbol| {
            let series = series_by_symbol
                .get(symbol)
                .map(|s| s.within(start, end))
                .unwrap_or_else(|| PriceSeries::empty(symbol.as_str()));
            (symbol.clone(), series)
        })
        .collect()
}

/// Run `config` over pre-loaded series, restricted to its date range.
pub fn run_backtest(
    config: &RunConfig,
    series_by_symbol: &BTreeMap<String, PriceSeries>,
    registry: &StrategyRegistry,
) -> Result<BacktestResult, BacktestError> {
    config.validate(registry)?;
    let setup = config.setup();
    let universe = configured_universe(config, series_by_symbol);

    let mut result = match config.mode() {
        RunMode::Single => {
            let symbol = &config.run.symbols[0];
            let series = universe
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| PriceSeries::empty(symbol.as_str()));
            run_single_backtest(registry, &config.run.strategy, &config.params, &series, &setup)?
        }
        RunMode::Portfolio => {
            run_portfolio_backtest(registry, &config.run.strategy, &config.params, &universe, &setup)?
        }
    };
    result.timeframe = config.run.timeframe;
    Ok(result)
}

/// Load `<data_dir>/<SYMBOL>.csv` for every configured symbol and run.
pub fn run_from_dir(
    config: &RunConfig,
    data_dir: &Path,
    registry: &StrategyRegistry,
) -> Result<BacktestResult, RunError> {
    config.validate(registry)?;
    let universe = load_universe(data_dir, &config.run.symbols)?;
    Ok(run_backtest(config, &universe, registry)?)
}
