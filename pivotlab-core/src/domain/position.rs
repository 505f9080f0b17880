//! Position state machine: `Flat | Long | Short`.
//!
//! The engine holds exactly one `PositionState`, so the single-position model
//! is enforced by the type rather than by flags. Transitions go through
//! [`PositionState::enter`] and [`PositionState::exit`]; stop updates go
//! through [`PositionState::tighten_stop`], which obeys the ratchet rule.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::pivot::Pivot;

/// Direction of an open position or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// Flat/Long/Short tag without the payload, for per-bar snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

/// Book-keeping for an open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_index: usize,
    pub entry_timestamp: NaiveDateTime,
    /// Fill price including slippage.
    pub entry_price: f64,
    /// Reference price before slippage (the signal bar's close).
    pub entry_reference: f64,
    pub size: f64,
    pub initial_stop: f64,
    pub current_stop: f64,
    /// Currency at risk at entry: `size * |entry_price - initial_stop|`.
    pub risk_amount: f64,
    /// Highest high (long) or lowest low (short) seen since entry.
    pub extreme_since_entry: f64,
    /// The pivot whose confirmation produced the entry signal, if any.
    pub signal_pivot: Option<Pivot>,
}

impl OpenPosition {
    /// Initial risk per unit of size.
    pub fn risk_per_unit(&self) -> f64 {
        (self.entry_price - self.initial_stop).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long(OpenPosition),
    Short(OpenPosition),
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(_) => Some(Side::Long),
            PositionState::Short(_) => Some(Side::Short),
        }
    }

    pub fn position_side(&self) -> PositionSide {
        match self {
            PositionState::Flat => PositionSide::Flat,
            PositionState::Long(_) => PositionSide::Long,
            PositionState::Short(_) => PositionSide::Short,
        }
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(p) | PositionState::Short(p) => Some(p),
        }
    }

    /// FLAT → LONG/SHORT. Returns the rejected position if already open.
    pub fn enter(&mut self, side: Side, position: OpenPosition) -> Result<(), OpenPosition> {
        if !self.is_flat() {
            return Err(position);
        }
        *self = match side {
            Side::Long => PositionState::Long(position),
            Side::Short => PositionState::Short(position),
        };
        Ok(())
    }

    /// LONG/SHORT → FLAT, handing back the closed position.
    pub fn exit(&mut self) -> Option<(Side, OpenPosition)> {
        match std::mem::take(self) {
            PositionState::Flat => None,
            PositionState::Long(p) => Some((Side::Long, p)),
            PositionState::Short(p) => Some((Side::Short, p)),
        }
    }

    /// Record a new bar extreme (high for longs, low for shorts).
    pub fn observe_extreme(&mut self, high: f64, low: f64) {
        match self {
            PositionState::Flat => {}
            PositionState::Long(p) => p.extreme_since_entry = p.extreme_since_entry.max(high),
            PositionState::Short(p) => p.extreme_since_entry = p.extreme_since_entry.min(low),
        }
    }

    /// Apply a proposed stop under the ratchet rule and return the resulting stop.
    ///
    /// Long stops may only rise, short stops may only fall. A NaN proposal is
    /// ignored.
    pub fn tighten_stop(&mut self, proposed: f64) -> Option<f64> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(p) => {
                if proposed > p.current_stop {
                    p.current_stop = proposed;
                }
                Some(p.current_stop)
            }
            PositionState::Short(p) => {
                if proposed < p.current_stop {
                    p.current_stop = proposed;
                }
                Some(p.current_stop)
            }
        }
    }
}
