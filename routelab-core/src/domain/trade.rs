//! Candidate and executed trades.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::ProductType;

/// Strategy-level "no quantity cap" marker for `requested_size`.
pub const UNBOUNDED_SIZE: u64 = u64::MAX;

/// Direction of a round-trip trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for longs, -1.0 for shorts.
    pub fn direction(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// Signed position delta for opening `size` units on this side.
    pub fn signed(self, size: u64) -> i64 {
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        match self {
            Side::Long => size,
            Side::Short => -size,
        }
    }
}

/// A hypothetical round trip emitted by a signal generator, before any
/// capital decision. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrade {
    pub symbol: String,
    pub side: Side,
    /// Upper bound on the funded size; `UNBOUNDED_SIZE` when the strategy sets none.
    pub requested_size: u64,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub entry_reason: Option<String>,
    pub exit_reason: Option<String>,
}

impl CandidateTrade {
    /// A round trip must exit strictly after it enters, at positive prices.
    pub fn is_well_formed(&self) -> bool {
        self.exit_timestamp > self.entry_timestamp
            && self.entry_price.is_finite()
            && self.exit_price.is_finite()
            && self.entry_price > 0.0
            && self.exit_price > 0.0
    }
}

/// A funded trade with realized results. Appended to the ledger once the
/// exit is processed and never mutated afterwards, except for the what-if
/// annotation pass of the metrics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTrade {
    // ── Identification ──
    pub symbol: String,
    pub side: Side,
    pub product_type: ProductType,

    // ── Entry / exit ──
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub entry_reason: Option<String>,
    pub exit_reason: Option<String>,

    // ── Size ──
    pub requested_size: u64,
    pub size: u64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission: f64,
    pub slippage: f64,
    pub other_charges: f64,
    /// Realized PnL after all costs.
    pub pnl: f64,
    /// `pnl` as a percentage of entry notional (10.0 means 10%).
    pub pnl_pct: f64,

    // ── Duration ──
    pub holding_period_bars: usize,

    // ── What-if ──
    pub max_theoretical_pnl: Option<f64>,
    pub pnl_capture_ratio: Option<f64>,
}

impl ExecutedTrade {
    pub fn total_costs(&self) -> f64 {
        self.commission + self.slippage + self.other_charges
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.size as f64
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    fn candidate() -> CandidateTrade {
        CandidateTrade {
            symbol: "SBIN".into(),
            side: Side::Long,
            requested_size: 10,
            entry_timestamp: ts(4),
            entry_price: 100.0,
            exit_timestamp: ts(6),
            exit_price: 110.0,
            entry_reason: Some("golden_cross".into()),
            exit_reason: None,
        }
    }

    #[test]
    fn side_helpers() {
        assert_eq!(Side::Long.direction(), 1.0);
        assert_eq!(Side::Short.direction(), -1.0);
        assert_eq!(Side::Long.signed(5), 5);
        assert_eq!(Side::Short.signed(5), -5);
        assert_eq!(Side::Long.signed(UNBOUNDED_SIZE), i64::MAX);
    }

    #[test]
    fn well_formed_requires_exit_after_entry() {
        let mut c = candidate();
        assert!(c.is_well_formed());
        c.exit_timestamp = c.entry_timestamp;
        assert!(!c.is_well_formed());
    }

    #[test]
    fn well_formed_rejects_non_positive_prices() {
        let mut c = candidate();
        c.entry_price = 0.0;
        assert!(!c.is_well_formed());
    }

    #[test]
    fn candidate_serialization_roundtrip() {
        let c = candidate();
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"long\""));
        let back: CandidateTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
