//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLC(V) bar for a single instrument at a single timestamp.
///
/// Timestamps are naive (exchange-local). Date-only inputs map to midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Candle colour, used by the order-block impulse heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Candle {
    Bullish,
    Bearish,
    Doji,
}

impl Bar {
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high bounds open/close, low bounds open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        if let Some(v) = self.volume {
            if !v.is_finite() || v < 0.0 {
                return false;
            }
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// `|close - open| / (high - low)`, or 0.0 for a zero-range bar.
    pub fn body_ratio(&self) -> f64 {
        let range = self.range();
        if range > 0.0 {
            self.body() / range
        } else {
            0.0
        }
    }

    pub fn candle(&self) -> Candle {
        if self.close > self.open {
            Candle::Bullish
        } else if self.close < self.open {
            Candle::Bearish
        } else {
            Candle::Doji
        }
    }
}
