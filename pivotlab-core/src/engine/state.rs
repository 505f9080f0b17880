//! Run result types: equity curve, per-bar trace, skipped entries.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderBlockZone, Pivot, PositionSide, Side, Trade};

/// Realized equity after bar `index` closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Position state recorded after each bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarSnapshot {
    pub index: usize,
    pub side: PositionSide,
    pub entry_index: Option<usize>,
    pub current_stop: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    AtrUnavailable,
    ZeroStopDistance,
    ZeroSize,
}

/// An entry signal that could not be turned into a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrade {
    pub index: usize,
    pub side: Side,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trades: Vec<Trade>,
    /// One point per input bar.
    pub equity_curve: Vec<EquityPoint>,
    /// One snapshot per input bar.
    pub snapshots: Vec<BarSnapshot>,
    pub skipped: Vec<SkippedTrade>,
    pub pivots: Vec<Pivot>,
    /// Higher-timeframe pivots on base-bar indices. Empty without an HTF rule.
    pub htf_pivots: Vec<Pivot>,
    pub zones: Vec<OrderBlockZone>,
    /// Entry signals fired, including skipped ones.
    pub signal_count: usize,
    pub initial_equity: f64,
    pub final_equity: f64,
}

impl SimulationResult {
    pub fn bar_count(&self) -> usize {
        self.equity_curve.len()
    }

    pub fn total_net_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.net_pnl).sum()
    }
}
