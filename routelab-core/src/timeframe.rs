//! Bar timeframe labels and annualization.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Default trading session length in minutes (09:15 to 15:30).
pub const DEFAULT_SESSION_MINUTES: u32 = 375;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    Minutes(u32),
    Hours(u32),
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    /// Parse `1d`, `1w`, `1mo`, `<n>m` / `<n>min` or `<n>h` / `<n>hour`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let normalized = value.trim().to_lowercase();
        let unknown = || ConfigError::UnknownTimeframe(value.to_string());

        match normalized.as_str() {
            "1d" | "1day" | "d" | "day" | "daily" => return Ok(Timeframe::Daily),
            "1w" | "1week" | "w" | "week" | "weekly" => return Ok(Timeframe::Weekly),
            "1mo" | "1month" | "mo" | "month" | "monthly" => return Ok(Timeframe::Monthly),
            _ => {}
        }

        let (number, unit) = if let Some(n) = normalized.strip_suffix("min") {
            (n, "m")
        } else if let Some(n) = normalized.strip_suffix("hour") {
            (n, "h")
        } else if let Some(n) = normalized.strip_suffix('m') {
            (n, "m")
        } else if let Some(n) = normalized.strip_suffix('h') {
            (n, "h")
        } else {
            return Err(unknown());
        };

        let n: u32 = number.parse().map_err(|_| unknown())?;
        if n == 0 {
            return Err(unknown());
        }
        match unit {
            "m" => Ok(Timeframe::Minutes(n)),
            _ if n.checked_mul(60).is_none() => Err(ConfigError::Invalid {
                field: "timeframe",
                reason: format!("{n} hours does not fit in a minute count"),
            }),
            _ => Ok(Timeframe::Hours(n)),
        }
    }

    /// Bar length in minutes for intraday timeframes; `None` past `u32`.
    pub fn intraday_minutes(&self) -> Option<u32> {
        match *self {
            Timeframe::Minutes(m) => Some(m),
            Timeframe::Hours(h) => h.checked_mul(60),
            _ => None,
        }
    }

    /// Bars per year: 252 daily, 52 weekly, 12 monthly, and
    /// `session_minutes / bar_minutes * 252` intraday.
    pub fn bars_per_year(&self, session_minutes: u32) -> f64 {
        match self {
            Timeframe::Daily => TRADING_DAYS_PER_YEAR,
            Timeframe::Weekly => 52.0,
            Timeframe::Monthly => 12.0,
            Timeframe::Minutes(m) => (session_minutes as f64 / *m as f64) * TRADING_DAYS_PER_YEAR,
            Timeframe::Hours(h) => {
                (session_minutes as f64 / (*h as f64 * 60.0)) * TRADING_DAYS_PER_YEAR
            }
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Minutes(m) => write!(f, "{m}m"),
            Timeframe::Hours(h) => write!(f, "{h}h"),
            Timeframe::Daily => f.write_str("1d"),
            Timeframe::Weekly => f.write_str("1w"),
            Timeframe::Monthly => f.write_str("1mo"),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Timeframe::parse(&value)
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}
