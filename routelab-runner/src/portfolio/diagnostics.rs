//! Routing diagnostics: how many candidates each bar saw, how many were
//! funded, and why the rest were not.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Short candidate while short selling is off for its product type.
    ShortNotAllowed,
    /// The symbol already holds `max_positions_per_symbol` open positions.
    PositionCap,
    /// Sizing produced zero units.
    ZeroSize,
    /// `max_entries_per_bar` reached on this bar.
    BarCap,
    /// `max_open_positions` reached.
    OpenCap,
    /// Malformed candidate or entry not on one of the symbol's bars.
    Invalid,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ShortNotAllowed => "short_not_allowed",
            RejectReason::PositionCap => "position_cap",
            RejectReason::ZeroSize => "zero_size",
            RejectReason::BarCap => "bar_cap",
            RejectReason::OpenCap => "open_cap",
            RejectReason::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarDiagnostics {
    pub timestamp: NaiveDateTime,
    pub candidates: usize,
    pub accepted: usize,
}

/// A requested symbol left out of a group run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedSymbol {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDiagnostics {
    /// Only bars that had at least one candidate.
    pub per_bar: Vec<BarDiagnostics>,
    pub total_candidates: usize,
    pub total_accepted: usize,
    pub rejections: BTreeMap<RejectReason, usize>,
    pub excluded: Vec<ExcludedSymbol>,
}

impl RoutingDiagnostics {
    pub fn reject(&mut self, reason: RejectReason) {
        *self.rejections.entry(reason).or_insert(0) += 1;
    }

    pub fn rejected(&self, reason: RejectReason) -> usize {
        self.rejections.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejections.values().sum()
    }

    pub(crate) fn record_bar(&mut self, timestamp: NaiveDateTime, candidates: usize, accepted: usize) {
        if candidates == 0 {
            return;
        }
        self.total_candidates += candidates;
        self.total_accepted += accepted;
        self.per_bar.push(BarDiagnostics {
            timestamp,
            candidates,
            accepted,
        });
    }

    pub fn exclude(&mut self, symbol: impl Into<String>, reason: impl Into<String>) {
        self.excluded.push(ExcludedSymbol {
            symbol: symbol.into(),
            reason: reason.into(),
        });
    }
}
