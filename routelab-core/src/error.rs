//! Error taxonomy for the engine.
//!
//! Only unrecoverable setup or input problems are errors. Routine outcomes
//! (a candidate sized to zero, a symbol without data in a group run) are
//! ordinary return values.

use std::fmt;

use thiserror::Error;

use crate::domain::BarError;

/// Invalid risk, cost, strategy or timeframe configuration. Raised before
/// any simulation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must not be negative (got {value})")]
    NegativeValue { field: &'static str, value: f64 },
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },
    #[error("stop_loss_pct and stop_loss_atr_mult are mutually exclusive")]
    ConflictingStops,
    #[error("invalid strategy parameter '{param}': {reason}")]
    InvalidParam { param: String, reason: String },
    #[error("unsupported timeframe: {0}")]
    UnknownTimeframe(String),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Reject negative or non-finite values.
pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(ConfigError::NegativeValue { field, value });
    }
    Ok(())
}

/// Reject zero, negative or non-finite values.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(ConfigError::NonPositive { field, value });
    }
    Ok(())
}

/// Stage of a run in which a fatal error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    CandidateGeneration,
    Simulation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Setup => "setup",
            Phase::CandidateGeneration => "candidate generation",
            Phase::Simulation => "simulation",
        };
        f.write_str(s)
    }
}

/// Fatal errors for a single run.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("insufficient data for '{symbol}' during {phase}: no usable bars")]
    InsufficientData { symbol: String, phase: Phase },
    #[error("no coverage: none of the {requested} requested symbols has usable bars")]
    NoCoverage { requested: usize },
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("unknown strategy code: {0}")]
    UnknownStrategy(String),
    #[error("invalid price series for '{symbol}': {source}")]
    InvalidSeries {
        symbol: String,
        #[source]
        source: BarError,
    },
}
