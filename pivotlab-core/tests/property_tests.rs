//! Property tests for simulation invariants.
//!
//! Uses proptest to verify, over random walks:
//! 1. Trailing stops never loosen while a position is open
//! 2. Every trade satisfies net = gross - commission - slippage
//! 3. At most one position is open at a time
//! 4. Identical inputs give identical outputs
//! 5. Final equity equals initial equity plus the sum of net PnL
//! 6. Breakout levels never sit inside the latest higher-timeframe pivot

use chrono::NaiveDate;
use proptest::prelude::*;
use pivotlab_core::config::SignalMode;
use pivotlab_core::domain::{Bar, PivotKind, PositionSide, PriceSeries, Side};
use pivotlab_core::{SimulationEngine, SimulationResult, StrategyConfig};

// ── Strategies (proptest) ────────────────────────────────────────────

/// (close change, upper wick, lower wick) per bar.
fn arb_steps() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((-3.0..3.0_f64, 0.0..2.0_f64, 0.0..2.0_f64), 40..200)
}

fn arb_config() -> impl Strategy<Value = StrategyConfig> {
    (
        1usize..4,
        1usize..4,
        3usize..20,
        2usize..15,
        1.0..4.0_f64,
        prop::option::of(1.0..4.0_f64),
        prop::bool::ANY,
        prop::bool::ANY,
        prop::option::of(0.5..3.0_f64),
        prop::bool::ANY,
        prop::bool::ANY,
    )
        .prop_map(
            |(left, right, ema, atr, k, trail_k, breakout, filter, tp, structure, htf)| {
                StrategyConfig {
                    left_bars: left,
                    right_bars: right,
                    ema_period: ema,
                    atr_period: atr,
                    atr_k: k,
                    atr_trail_k: trail_k,
                    signal_mode: if breakout {
                        SignalMode::Breakout
                    } else {
                        SignalMode::Pivot
                    },
                    filter_trades: filter,
                    take_profit_r: tp,
                    structure_stop: structure,
                    use_htf: htf,
                    htf_rule: "3D".to_string(),
                    impulse_bars: 2,
                    min_body_ratio: 0.2,
                    ..Default::default()
                }
            },
        )
}

fn build_bars(steps: &[(f64, f64, f64)]) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2022, 1, 3)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut price = 100.0_f64;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(change, up, down))| {
            let open = price;
            price = (price + change).max(5.0);
            Bar::new(
                base + chrono::Duration::days(i as i64),
                open,
                open.max(price) + up,
                open.min(price) - down,
                price,
            )
        })
        .collect()
}

fn run(config: StrategyConfig, bars: Vec<Bar>) -> SimulationResult {
    let engine = SimulationEngine::new(config).unwrap();
    engine.run(&PriceSeries::new(bars).unwrap())
}

proptest! {
    /// Stops only move up for longs and down for shorts within one position.
    #[test]
    fn trailing_stop_is_monotonic(steps in arb_steps(), config in arb_config()) {
        let result = run(config, build_bars(&steps));
        for pair in result.snapshots.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.entry_index.is_none() || prev.entry_index != next.entry_index {
                continue;
            }
            let (a, b) = (prev.current_stop.unwrap(), next.current_stop.unwrap());
            match next.side {
                PositionSide::Long => prop_assert!(b >= a, "long stop loosened {a} -> {b}"),
                PositionSide::Short => prop_assert!(b <= a, "short stop loosened {a} -> {b}"),
                PositionSide::Flat => prop_assert!(false, "flat snapshot with entry index"),
            }
        }
    }

    #[test]
    fn ledger_conserves_pnl(steps in arb_steps(), config in arb_config()) {
        let result = run(config, build_bars(&steps));
        for t in &result.trades {
            prop_assert!((t.net_pnl - (t.gross_pnl - t.commission - t.slippage)).abs() < 1e-6);
            prop_assert!(t.size >= 1.0);
            prop_assert!(t.exit_index >= t.entry_index);
            prop_assert_eq!(t.bars_held, t.exit_index - t.entry_index);
        }
        let expected = result.initial_equity + result.total_net_pnl();
        prop_assert!((result.final_equity - expected).abs() < 1e-6);
    }

    /// Trades never overlap and snapshots agree with the ledger.
    #[test]
    fn single_position_at_a_time(steps in arb_steps(), config in arb_config()) {
        let n = steps.len();
        let result = run(config, build_bars(&steps));
        prop_assert_eq!(result.snapshots.len(), n);
        prop_assert_eq!(result.equity_curve.len(), n);

        for pair in result.trades.windows(2) {
            prop_assert!(pair[1].entry_index >= pair[0].exit_index);
        }
        // Nothing is left open after the final bar.
        prop_assert_eq!(result.snapshots[n - 1].side, PositionSide::Flat);
    }

    #[test]
    fn runs_are_deterministic(steps in arb_steps(), config in arb_config()) {
        let bars = build_bars(&steps);
        let a = run(config.clone(), bars.clone());
        let b = run(config, bars);
        prop_assert_eq!(a, b);
    }

    /// Entries only happen when a pivot was already confirmed.
    #[test]
    fn entries_use_confirmed_pivots(steps in arb_steps(), config in arb_config()) {
        let result = run(config, build_bars(&steps));
        for t in &result.trades {
            let pivot = t.signal_pivot.unwrap();
            prop_assert!(pivot.confirmed_at_index <= t.entry_index);
        }
    }

    #[test]
    fn breakout_levels_include_htf_pivots(steps in arb_steps(), ema in 2usize..8) {
        let config = StrategyConfig {
            ema_period: ema,
            atr_period: 5,
            signal_mode: SignalMode::Breakout,
            use_htf: true,
            htf_rule: "3D".to_string(),
            left_bars: 1,
            right_bars: 1,
            ..Default::default()
        };
        let result = run(config, build_bars(&steps));
        for t in &result.trades {
            let level = t.signal_pivot.unwrap().price;
            let kind = match t.side {
                Side::Long => PivotKind::High,
                Side::Short => PivotKind::Low,
            };
            let htf = result
                .htf_pivots
                .iter()
                .filter(|p| p.kind == kind && p.confirmed_at_index <= t.entry_index)
                .last();
            if let Some(htf) = htf {
                match t.side {
                    Side::Long => prop_assert!(level >= htf.price),
                    Side::Short => prop_assert!(level <= htf.price),
                }
            }
        }
    }
}
