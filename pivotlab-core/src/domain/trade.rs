//! Trade: a completed round trip, appended to the ledger on exit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::pivot::Pivot;
use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Stop,
    SignalReversal,
    EndOfData,
    TakeProfit,
}

/// A closed round trip. Immutable once constructed.
///
/// `entry_price`/`exit_price` are actual fills (slippage included).
/// `gross_pnl` is measured on reference prices, so the accounting identity
/// `net_pnl == gross_pnl - commission - slippage` holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,

    // ── Entry ──
    pub entry_index: usize,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size & risk ──
    pub size: f64,
    pub initial_stop: f64,
    pub risk_amount: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission: f64,
    pub slippage: f64,
    pub net_pnl: f64,
    /// Net PnL in units of initial risk.
    pub r_multiple: f64,

    pub bars_held: usize,
    pub signal_pivot: Option<Pivot>,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    /// Net return as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.size;
        if notional == 0.0 {
            return 0.0;
        }
        self.net_pnl / notional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_trade() -> Trade {
        let day = |d: u32| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        Trade {
            side: Side::Long,
            entry_index: 4,
            entry_timestamp: day(5),
            entry_price: 100.0,
            exit_index: 8,
            exit_timestamp: day(11),
            exit_price: 110.0,
            exit_reason: ExitReason::Stop,
            size: 50.0,
            initial_stop: 96.0,
            risk_amount: 200.0,
            gross_pnl: 500.0,
            commission: 10.0,
            slippage: 5.0,
            net_pnl: 485.0,
            r_multiple: 485.0 / 200.0,
            bars_held: 4,
            signal_pivot: None,
        }
    }

    #[test]
    fn return_pct_calculation() {
        let trade = sample_trade();
        assert!((trade.return_pct() - 485.0 / 5000.0).abs() < 1e-12);
    }

    #[test]
    fn is_winner() {
        assert!(sample_trade().is_winner());
    }

    #[test]
    fn exit_reason_serializes_screaming_case() {
        let json = serde_json::to_string(&ExitReason::SignalReversal).unwrap();
        assert_eq!(json, "\"SIGNAL_REVERSAL\"");
    }
}
