//! ATR stops: initial distance and chandelier trailing.
//!
//! The ATR series is precomputed. Trailing candidates are derived from the
//! extreme since entry and are ratcheted by
//! [`PositionState::tighten_stop`](crate::domain::PositionState::tighten_stop),
//! so a stop never loosens.
//!
//! With structure stops enabled, the initial stop may sit further out than
//! `k·ATR`: below the nearest confirmed swing low for a long, above the
//! swing high for a short.

use crate::domain::{Bar, Side};
use crate::indicators::{Atr, Indicator};

#[derive(Debug, Clone)]
pub struct StopEngine {
    atr: Vec<f64>,
    initial_k: f64,
    trail_k: f64,
}

impl StopEngine {
    pub fn new(bars: &[Bar], atr_period: usize, initial_k: f64, trail_k: f64) -> Self {
        Self {
            atr: Atr::new(atr_period).compute(bars),
            initial_k,
            trail_k,
        }
    }

    /// ATR at bar `j`, if warmed up.
    pub fn atr_at(&self, j: usize) -> Option<f64> {
        self.atr.get(j).copied().filter(|v| v.is_finite())
    }

    /// `entry ∓ k·ATR`, or `None` during ATR warmup.
    pub fn initial_stop(&self, side: Side, entry_price: f64, j: usize) -> Option<f64> {
        self.atr_at(j)
            .map(|atr| entry_price - side.sign() * self.initial_k * atr)
    }

    /// Chandelier level from the extreme since entry.
    ///
    /// Long: `highest_high - k_trail·ATR`. Short: `lowest_low + k_trail·ATR`.
    pub fn trail_candidate(&self, side: Side, extreme: f64, j: usize) -> Option<f64> {
        self.atr_at(j).map(|atr| extreme - side.sign() * self.trail_k * atr)
    }
}

pub fn stop_distance(entry_price: f64, stop: f64) -> f64 {
    (entry_price - stop).abs()
}

/// The wider of the ATR stop and the structure level.
pub fn widen_to_structure(side: Side, atr_stop: f64, structure: Option<f64>) -> f64 {
    match (side, structure) {
        (Side::Long, Some(level)) => atr_stop.min(level),
        (Side::Short, Some(level)) => atr_stop.max(level),
        (_, None) => atr_stop,
    }
}
