//! Reporting and export: JSON manifest, CSV ledgers and a Markdown summary.
//!
//! CSV writers take any `io::Write`; the `export_*` helpers render to a
//! `String`. `read_equity_csv` parses an equity CSV back so curves can be
//! re-analysed offline.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use routelab_core::domain::{CurvePoint, EquityPoint, ExecutedTrade};

use crate::data_loader::{parse_timestamp, TIMESTAMP_FORMAT};
use crate::result::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

const TRADE_COLUMNS: [&str; 20] = [
    "symbol",
    "side",
    "product_type",
    "entry_timestamp",
    "entry_price",
    "exit_timestamp",
    "exit_price",
    "requested_size",
    "size",
    "gross_pnl",
    "commission",
    "slippage",
    "other_charges",
    "pnl",
    "pnl_pct",
    "holding_period_bars",
    "entry_reason",
    "exit_reason",
    "max_theoretical_pnl",
    "pnl_capture_ratio",
];

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

/// Write the trade ledger as CSV.
pub fn write_trades_csv<W: Write>(trades: &[ExecutedTrade], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(TRADE_COLUMNS)?;

    for t in trades {
        let row: [String; 20] = [
            t.symbol.clone(),
            format!("{:?}", t.side).to_lowercase(),
            format!("{:?}", t.product_type).to_lowercase(),
            t.entry_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.6}", t.exit_price),
            t.requested_size.to_string(),
            t.size.to_string(),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.slippage),
            format!("{:.2}", t.other_charges),
            format!("{:.2}", t.pnl),
            format!("{:.4}", t.pnl_pct),
            t.holding_period_bars.to_string(),
            t.entry_reason.clone().unwrap_or_default(),
            t.exit_reason.clone().unwrap_or_default(),
            opt(t.max_theoretical_pnl),
            opt(t.pnl_capture_ratio),
        ];
        wtr.write_record(&row)?;
    }
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

/// Write an equity curve as `timestamp,equity,cash`.
pub fn write_equity_csv<W: Write>(curve: &[EquityPoint], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "equity", "cash"])?;
    for p in curve {
        wtr.write_record([
            p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            p.equity.to_string(),
            p.cash.to_string(),
        ])?;
    }
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

/// Write a benchmark curve as `timestamp,value`.
pub fn write_curve_csv<W: Write>(curve: &[CurvePoint], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "value"])?;
    for p in curve {
        wtr.write_record([
            p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            p.value.to_string(),
        ])?;
    }
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

pub fn export_trades_csv(trades: &[ExecutedTrade]) -> Result<String> {
    let mut buf = Vec::new();
    write_trades_csv(trades, &mut buf)?;
    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut buf = Vec::new();
    write_equity_csv(curve, &mut buf)?;
    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

#[derive(Debug, Deserialize)]
struct EquityRow {
    timestamp: String,
    equity: f64,
    cash: f64,
}

/// Parse an equity CSV written by [`write_equity_csv`].
pub fn read_equity_csv<R: Read>(reader: R) -> Result<Vec<EquityPoint>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut curve = Vec::new();
    for (i, row) in rdr.deserialize::<EquityRow>().enumerate() {
        let row = row.with_context(|| format!("equity CSV row {}", i + 1))?;
        let Some(timestamp) = parse_timestamp(&row.timestamp) else {
            bail!("equity CSV row {}: bad timestamp '{}'", i + 1, row.timestamp);
        };
        curve.push(EquityPoint {
            timestamp,
            equity: row.equity,
            cash: row.cash,
        });
    }
    Ok(curve)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set of one run under
/// `output_dir/{strategy}_{timestamp}/`:
/// `manifest.json`, `trades.csv`, `equity.csv`, `benchmark.csv` and
/// `report.md`.
///
/// Returns the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        result.strategy,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;

    let create = |name: &str| {
        let path = run_dir.join(name);
        std::fs::File::create(&path).with_context(|| format!("failed to create {}", path.display()))
    };
    write_trades_csv(&result.trades, create("trades.csv")?)?;
    write_equity_csv(&result.equity_curve, create("equity.csv")?)?;
    write_curve_csv(&result.benchmark, create("benchmark.csv")?)?;

    std::fs::write(run_dir.join("report.md"), generate_report(result))?;
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's `manifest.json`.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let metric = |name: &str| result.metrics.get(name);
    let pct = |v: Option<f64>| v.map_or("n/a".to_string(), |x| format!("{:.2}%", x * 100.0));
    let num = |v: Option<f64>| v.map_or("n/a".to_string(), |x| format!("{x:.3}"));

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    md.push_str(&format!("| Mode | {:?} |\n", result.mode));
    md.push_str(&format!("| Symbols | {} |\n", result.symbols.join(", ")));
    md.push_str(&format!("| Timeframe | {} |\n", result.timeframe));
    md.push_str(&format!("| Initial Capital | {:.2} |\n", result.initial_capital));
    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        md.push_str(&format!("| Period | {} to {} |\n", first.timestamp, last.timestamp));
    }
    md.push_str(&format!("| Fingerprint | {} |\n\n", result.fingerprint()));

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Final Value | {:.2} |\n", result.final_value()));
    md.push_str(&format!("| Total Return | {} |\n", pct(metric("total_return"))));
    md.push_str(&format!("| Annual Return | {} |\n", pct(metric("annual_return"))));
    md.push_str(&format!("| Max Drawdown | {} |\n", pct(metric("max_drawdown"))));
    md.push_str(&format!("| Sharpe (annualized) | {} |\n", num(metric("sharpe_annualized"))));
    md.push_str(&format!("| Sortino | {} |\n", num(metric("sortino"))));
    md.push_str(&format!("| Calmar | {} |\n", num(metric("calmar"))));
    md.push_str(&format!("| Win Rate | {} |\n", pct(metric("win_rate"))));
    md.push_str(&format!("| Profit Factor | {} |\n", num(metric("profit_factor"))));
    md.push_str(&format!("| Trades | {} |\n", result.trades.len()));
    md.push_str(&format!("| Total Costs | {:.2} |\n\n", metric("total_costs").unwrap_or(0.0)));

    if !result.per_symbol.is_empty() {
        md.push_str("## Per Symbol\n\n");
        md.push_str("| Symbol | Trades | Net PnL |\n| --- | --- | --- |\n");
        for (symbol, s) in &result.per_symbol {
            md.push_str(&format!("| {symbol} | {} | {:.2} |\n", s.trade_count, s.net_pnl));
        }
        md.push('\n');
    }

    if let Some(routing) = &result.routing {
        md.push_str("## Routing\n\n");
        md.push_str(&format!(
            "- Candidates: {}, accepted: {}\n",
            routing.total_candidates, routing.total_accepted
        ));
        for (reason, count) in &routing.rejections {
            md.push_str(&format!("- Rejected ({}): {count}\n", reason.as_str()));
        }
        md.push('\n');
    }

    if !result.excluded.is_empty() {
        md.push_str("## Excluded Symbols\n\n");
        for e in &result.excluded {
            md.push_str(&format!("- {}: {}\n", e.symbol, e.reason));
        }
        md.push('\n');
    }

    md
}
