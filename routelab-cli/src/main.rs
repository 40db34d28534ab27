//! RouteLab CLI: run and sweep backtests over CSV bar files.
//!
//! Commands:
//! - `run`: execute one backtest from a TOML config and save artifacts
//! - `sweep`: backtest every point of a parameter grid in parallel
//! - `strategies`: list the registered strategy codes

mod logging;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use routelab_core::signals::StrategyRegistry;
use routelab_runner::runner::{configured_universe, run_from_dir};
use routelab_runner::{
    load_universe, run_sweep, save_artifacts, BacktestResult, ParamGrid, RunConfig, SweepOutcome,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "routelab",
    about = "RouteLab CLI: single-symbol and capital-aware portfolio backtests"
)]
struct Cli {
    /// Log level or filter directive (overridden by ROUTELAB_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Directory holding one `<SYMBOL>.csv` file per symbol.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Backtest a grid of parameter values on top of a config's params.
    Sweep {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Directory holding one `<SYMBOL>.csv` file per symbol.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Grid axis as `name=v1,v2,...`; repeat for more axes.
        #[arg(long = "axis", required = true)]
        axes: Vec<String>,

        /// Write all outcomes to this JSON file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List registered strategy codes.
    Strategies,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level, &cli.log_format).map_err(|e| anyhow!(e))?;
    let registry = StrategyRegistry::with_builtins();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            output_dir,
        } => run_cmd(&registry, &config, &data_dir, &output_dir),
        Commands::Sweep {
            config,
            data_dir,
            axes,
            output,
        } => sweep_cmd(&registry, &config, &data_dir, &axes, output.as_deref()),
        Commands::Strategies => {
            for code in registry.codes() {
                println!("{code}");
            }
            Ok(())
        }
    }
}

fn run_cmd(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_dir: &Path,
    output_dir: &Path,
) -> Result<()> {
    let config = RunConfig::from_path(config_path)?;
    let result = run_from_dir(&config, data_dir, registry)
        .with_context(|| format!("backtest '{}' failed", config.run.strategy))?;

    print_summary(&result);

    let run_dir = save_artifacts(&result, output_dir)?;
    tracing::info!(dir = %run_dir.display(), fingerprint = %result.fingerprint(), "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn sweep_cmd(
    registry: &StrategyRegistry,
    config_path: &Path,
    data_dir: &Path,
    axes: &[String],
    output: Option<&Path>,
) -> Result<()> {
    let config = RunConfig::from_path(config_path)?;
    config.validate(registry)?;

    let mut grid = ParamGrid::new();
    for raw in axes {
        let (name, values) = parse_axis(raw)?;
        grid = grid.axis(name, values);
    }

    let loaded = load_universe(data_dir, &config.run.symbols)?;
    let universe = configured_universe(&config, &loaded);
    let outcomes = run_sweep(
        registry,
        &config.run.strategy,
        &config.params,
        &grid,
        &universe,
        &config.setup(),
    )?;
    if outcomes.is_empty() {
        bail!("no valid parameter combinations in a grid of {}", grid.size());
    }

    print_sweep(&outcomes);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcomes)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep saved to: {}", path.display());
    }
    Ok(())
}

/// Parse `name=v1,v2,...` into one grid axis.
fn parse_axis(raw: &str) -> Result<(String, Vec<f64>)> {
    let Some((name, values)) = raw.split_once('=') else {
        bail!("axis '{raw}' must look like name=v1,v2");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("axis '{raw}' has no parameter name");
    }
    let values = values
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid value '{v}' for axis '{name}'"))
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok((name.to_string(), values))
}

fn print_summary(result: &BacktestResult) {
    let metric = |name: &str| result.metrics.get(name);
    let pct = |name: &str| metric(name).map_or("n/a".to_string(), |v| format!("{:.2}%", v * 100.0));
    let num = |name: &str| metric(name).map_or("n/a".to_string(), |v| format!("{v:.3}"));

    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", result.strategy);
    println!("Mode:           {:?}", result.mode);
    println!("Symbols:        {}", result.symbols.join(", "));
    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        println!("Period:         {} to {}", first.timestamp, last.timestamp);
    }
    println!("Bars:           {}", result.equity_curve.len());
    println!("Trades:         {}", result.trades.len());
    println!();
    println!("--- Performance ---");
    println!("Final Value:    {:.2}", result.final_value());
    println!("Total Return:   {}", pct("total_return"));
    println!("Annual Return:  {}", pct("annual_return"));
    println!("Sharpe:         {}", num("sharpe_annualized"));
    println!("Sortino:        {}", num("sortino"));
    println!("Calmar:         {}", num("calmar"));
    println!("Max Drawdown:   {}", pct("max_drawdown"));
    println!("Win Rate:       {}", pct("win_rate"));
    println!("Profit Factor:  {}", num("profit_factor"));
    println!("Total Costs:    {}", num("total_costs"));

    if let Some(routing) = &result.routing {
        println!();
        println!("--- Routing ---");
        println!(
            "Candidates:     {} ({} accepted)",
            routing.total_candidates, routing.total_accepted
        );
        for (reason, count) in &routing.rejections {
            println!("  {:<14}{count}", reason.as_str());
        }
    }
    for excluded in &result.excluded {
        println!("WARNING: {} excluded ({})", excluded.symbol, excluded.reason);
    }
    println!();
}

fn print_sweep(outcomes: &[SweepOutcome]) {
    println!("{:<40} {:>8} {:>12} {:>10}", "Params", "Trades", "Return", "Sharpe");
    println!("{}", "-".repeat(73));
    for outcome in outcomes {
        let params = outcome
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        let ret = outcome
            .metrics
            .get("total_return")
            .map_or("n/a".to_string(), |v| format!("{:.2}%", v * 100.0));
        let sharpe = outcome
            .metrics
            .get("sharpe_annualized")
            .map_or("n/a".to_string(), |v| format!("{v:.3}"));
        println!("{params:<40} {:>8} {ret:>12} {sharpe:>10}", outcome.trade_count);
    }
}
