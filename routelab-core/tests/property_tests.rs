//! Property tests for sizing and cost invariants.
//!
//! Uses proptest to verify:
//! 1. Size bounds: never above the requested size, the notional cap or (longs) cash
//! 2. Monotonicity: more equity and cash never yields a smaller size
//! 3. Short gating: shorts size to zero unless short selling is allowed
//! 4. Cost identity: net = gross - commission - slippage - other charges

use chrono::NaiveDate;
use proptest::prelude::*;
use routelab_core::config::{CommissionModel, CostsConfig, RiskConfig};
use routelab_core::domain::{CandidateTrade, Side, UNBOUNDED_SIZE};
use routelab_core::execution::apply_costs;
use routelab_core::sizing::compute_size;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..2_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_capital() -> impl Strategy<Value = f64> {
    1_000.0..5_000_000.0_f64
}

fn arb_risk() -> impl Strategy<Value = RiskConfig> {
    (
        1.0..100.0_f64,
        0.1..5.0_f64,
        proptest::option::of(0.5..10.0_f64),
        any::<bool>(),
    )
        .prop_map(|(max_pos, per_trade, stop, shorts)| RiskConfig {
            max_position_size_pct: max_pos,
            per_trade_risk_pct: per_trade,
            allow_short_selling: shorts,
            stop_loss_pct: stop,
            ..RiskConfig::default()
        })
}

fn arb_requested() -> impl Strategy<Value = u64> {
    prop_oneof![Just(UNBOUNDED_SIZE), 1u64..100_000]
}

// ── 1. Size bounds ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn size_respects_every_bound(
        price in arb_price(),
        equity in arb_capital(),
        cash_frac in 0.0..1.0_f64,
        risk in arb_risk(),
        requested in arb_requested(),
    ) {
        let cash = equity * cash_frac;
        let size = compute_size(Side::Long, price, equity, cash, &risk, requested, None);
        prop_assert!(size <= requested);
        prop_assert!(size as f64 * price <= equity * risk.max_position_size_pct / 100.0 + 1e-6);
        prop_assert!(size as f64 * price <= cash + 1e-6);
        if let Some(stop) = risk.stop_loss_pct {
            let loss_at_stop = size as f64 * price * stop / 100.0;
            prop_assert!(loss_at_stop <= equity * risk.per_trade_risk_pct / 100.0 + 1e-6);
        }
    }
}

// ── 2. Monotonicity ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn size_is_monotone_in_capital(
        price in arb_price(),
        equity in arb_capital(),
        bump in 1.0..3.0_f64,
        risk in arb_risk(),
        requested in arb_requested(),
    ) {
        let small = compute_size(Side::Long, price, equity, equity, &risk, requested, None);
        let large = compute_size(
            Side::Long, price, equity * bump, equity * bump, &risk, requested, None,
        );
        prop_assert!(large >= small);
    }

    #[test]
    fn size_is_monotone_in_requested(
        price in arb_price(),
        equity in arb_capital(),
        risk in arb_risk(),
        requested in 1u64..10_000,
    ) {
        let a = compute_size(Side::Long, price, equity, equity, &risk, requested, None);
        let b = compute_size(Side::Long, price, equity, equity, &risk, requested + 1, None);
        prop_assert!(b >= a);
    }
}

// ── 3. Short gating ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn shorts_need_permission(
        price in arb_price(),
        equity in arb_capital(),
        risk in arb_risk(),
    ) {
        let size = compute_size(Side::Short, price, equity, 0.0, &risk, UNBOUNDED_SIZE, None);
        if !risk.allow_short_selling {
            prop_assert_eq!(size, 0);
        }
    }
}

// ── 4. Cost identity ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn net_pnl_identity(
        entry in arb_price(),
        exit in arb_price(),
        size in 0u64..10_000,
        fee in 0.0..50.0_f64,
        slip in 0.0..1.0_f64,
        charges in 0.0..0.5_f64,
        short in any::<bool>(),
    ) {
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let candidate = CandidateTrade {
            symbol: "LT".into(),
            side: if short { Side::Short } else { Side::Long },
            requested_size: size,
            entry_timestamp: day(3),
            entry_price: entry,
            exit_timestamp: day(4),
            exit_price: exit,
            entry_reason: None,
            exit_reason: None,
        };
        let costs = CostsConfig {
            commission: CommissionModel::Flat { fee },
            slippage_per_share: slip,
            other_charges_pct: charges,
            ..CostsConfig::default()
        };
        let b = apply_costs(&candidate, size, &costs);
        prop_assert!(b.commission >= 0.0 && b.slippage >= 0.0 && b.other_charges >= 0.0);
        let expected = b.gross_pnl - b.commission - b.slippage - b.other_charges;
        prop_assert!((b.net_pnl - expected).abs() < 1e-6);
    }
}
