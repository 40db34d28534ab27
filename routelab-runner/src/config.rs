//! Run configuration loaded from TOML.
//!
//! ```toml
//! [run]
//! strategy = "sma_crossover"
//! symbols = ["INFY", "TCS"]
//! initial_capital = 100000.0
//! timeframe = "1d"
//! start = "2023-01-01"
//!
//! [params]
//! fast = 10
//! slow = 30
//!
//! [risk]
//! max_position_size_pct = 25.0
//!
//! [costs.commission]
//! model = "flat"
//! fee = 20.0
//! ```
//!
//! Every section except `[run]` is optional and falls back to its defaults.
//! `validate()` performs every check up front so a bad file never reaches
//! the simulation loop.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use routelab_core::config::{CostsConfig, RiskConfig};
use routelab_core::signals::{StrategyParams, StrategyRegistry};
use routelab_core::timeframe::{Timeframe, DEFAULT_SESSION_MINUTES};
use routelab_core::{BacktestError, ConfigError};

use crate::metrics::MetricsSettings;

/// Errors from reading a run configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Single-symbol or routed multi-symbol run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Single,
    Portfolio,
}

/// Top-level configuration for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run: RunSection,
    #[serde(default)]
    pub params: StrategyParams,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub costs: CostsConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub strategy: String,
    pub symbols: Vec<String>,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default)]
    pub timeframe: Timeframe,
    /// First calendar date included (inclusive).
    #[serde(default)]
    pub start: Option<NaiveDate>,
    /// Last calendar date included (inclusive).
    #[serde(default)]
    pub end: Option<NaiveDate>,
    /// Defaults to `single` for one symbol and `portfolio` otherwise.
    #[serde(default)]
    pub mode: Option<RunMode>,
    #[serde(default = "default_session_minutes")]
    pub session_minutes: u32,
}

/// Caps applied by the portfolio router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationConfig {
    #[serde(default = "default_max_positions_per_symbol")]
    pub max_positions_per_symbol: usize,
    #[serde(default)]
    pub max_open_positions: Option<usize>,
    #[serde(default)]
    pub max_entries_per_bar: Option<usize>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_positions_per_symbol: default_max_positions_per_symbol(),
            max_open_positions: None,
            max_entries_per_bar: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    #[default]
    MomentumLiquidity,
    Flat,
}

/// Candidate scoring settings for the portfolio router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    #[serde(default)]
    pub scorer: ScorerKind,
    #[serde(default = "default_scoring_lookback")]
    pub lookback: usize,
    #[serde(default = "default_momentum_weight")]
    pub momentum_weight: f64,
    #[serde(default = "default_liquidity_weight")]
    pub liquidity_weight: f64,
    #[serde(default = "default_volatility_weight")]
    pub volatility_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::default(),
            lookback: default_scoring_lookback(),
            momentum_weight: default_momentum_weight(),
            liquidity_weight: default_liquidity_weight(),
            volatility_weight: default_volatility_weight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Annual risk-free rate as a fraction (0.06 = 6%).
    #[serde(default)]
    pub risk_free_rate: f64,
}

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_session_minutes() -> u32 {
    DEFAULT_SESSION_MINUTES
}

fn default_max_positions_per_symbol() -> usize {
    1
}

fn default_scoring_lookback() -> usize {
    20
}

fn default_momentum_weight() -> f64 {
    1.0
}

fn default_liquidity_weight() -> f64 {
    0.05
}

fn default_volatility_weight() -> f64 {
    1.0
}

/// Everything a simulation needs besides prices and candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSetup {
    pub initial_capital: f64,
    pub risk: RiskConfig,
    pub costs: CostsConfig,
    pub allocation: AllocationConfig,
    pub scoring: ScoringConfig,
    pub metrics: MetricsSettings,
}

impl SimulationSetup {
    /// Default risk, frictionless costs and daily annualization.
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            risk: RiskConfig::default(),
            costs: CostsConfig::frictionless(),
            allocation: AllocationConfig::default(),
            scoring: ScoringConfig::default(),
            metrics: MetricsSettings::daily(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_capital.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "initial_capital",
            });
        }
        if self.initial_capital <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "initial_capital",
                value: self.initial_capital,
            });
        }
        self.risk.validate()?;
        self.costs.validate()?;
        if self.allocation.max_positions_per_symbol == 0 {
            return Err(invalid("allocation.max_positions_per_symbol", "must be at least 1"));
        }
        if self.allocation.max_open_positions == Some(0) {
            return Err(invalid("allocation.max_open_positions", "must be at least 1"));
        }
        if self.allocation.max_entries_per_bar == Some(0) {
            return Err(invalid("allocation.max_entries_per_bar", "must be at least 1"));
        }
        if self.scoring.lookback == 0 {
            return Err(invalid("scoring.lookback", "must be at least 1"));
        }
        for (field, weight) in [
            ("scoring.momentum_weight", self.scoring.momentum_weight),
            ("scoring.liquidity_weight", self.scoring.liquidity_weight),
            ("scoring.volatility_weight", self.scoring.volatility_weight),
        ] {
            if !weight.is_finite() {
                return Err(ConfigError::NotFinite { field });
            }
        }
        if !self.metrics.risk_free_rate.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "metrics.risk_free_rate",
            });
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

impl RunConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_toml(&text)?)
    }

    /// Explicit mode, or inferred from the symbol count.
    pub fn mode(&self) -> RunMode {
        self.run.mode.unwrap_or(if self.run.symbols.len() == 1 {
            RunMode::Single
        } else {
            RunMode::Portfolio
        })
    }

    pub fn setup(&self) -> SimulationSetup {
        SimulationSetup {
            initial_capital: self.run.initial_capital,
            risk: self.risk.clone(),
            costs: self.costs.clone(),
            allocation: self.allocation.clone(),
            scoring: self.scoring.clone(),
            metrics: MetricsSettings {
                risk_free_rate: self.metrics.risk_free_rate,
                bars_per_year: self.run.timeframe.bars_per_year(self.run.session_minutes),
            },
        }
    }

    /// Half-open timestamp bounds covering every instant of the `start`
    /// through `end` dates: the end bound is midnight after `end`.
    pub fn date_range(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let start = self.run.start.map(|d| d.and_time(NaiveTime::MIN));
        let end = self
            .run
            .end
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN));
        (start, end)
    }

    /// Check the whole configuration, including the strategy code and its
    /// parameters, before any data is touched.
    pub fn validate(&self, registry: &StrategyRegistry) -> Result<(), BacktestError> {
        if self.run.symbols.is_empty() {
            return Err(invalid("run.symbols", "at least one symbol is required").into());
        }
        if self.run.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("run.symbols", "symbol names must not be blank").into());
        }
        if self.mode() == RunMode::Single && self.run.symbols.len() != 1 {
            return Err(invalid("run.mode", "single mode takes exactly one symbol").into());
        }
        if self.run.session_minutes == 0 {
            return Err(invalid("run.session_minutes", "must be at least 1").into());
        }
        if let (Some(start), Some(end)) = (self.run.start, self.run.end) {
            if start > end {
                return Err(invalid("run.start", "start date is after end date").into());
            }
        }
        self.setup().validate()?;
        let generator = registry.get(&self.run.strategy)?;
        generator.validate(&self.params)?;
        Ok(())
    }
}
