//! EMA trend filter, optionally on a higher timeframe.
//!
//! With a higher-timeframe rule, base bar `j` sees the EMA of the last bucket
//! that closed strictly before `j`'s own bucket. The bucket `j` sits in is
//! still forming and is never used.

use serde::{Deserialize, Serialize};

use super::resample::{resample, HtfRule};
use crate::domain::Bar;
use crate::indicators::ema_of_series;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendState {
    Up,
    Down,
    Flat,
}

impl TrendState {
    /// Classify `close` against `ema`. NaN EMA means no trend yet.
    pub fn classify(close: f64, ema: f64) -> Self {
        if ema.is_nan() {
            TrendState::Flat
        } else if close > ema {
            TrendState::Up
        } else if close < ema {
            TrendState::Down
        } else {
            TrendState::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendFilter {
    ema_period: usize,
    htf: Option<HtfRule>,
}

/// Per-bar EMA reference and resulting trend state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub ema: Vec<f64>,
    pub states: Vec<TrendState>,
}

impl TrendSeries {
    pub fn state_at(&self, j: usize) -> TrendState {
        self.states.get(j).copied().unwrap_or(TrendState::Flat)
    }
}

impl TrendFilter {
    pub fn new(ema_period: usize, htf: Option<HtfRule>) -> Self {
        Self { ema_period, htf }
    }

    pub fn compute(&self, bars: &[Bar]) -> TrendSeries {
        let ema = match self.htf {
            None => {
                let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
                ema_of_series(&closes, self.ema_period)
            }
            Some(rule) => self.htf_ema(bars, rule),
        };
        let states = bars
            .iter()
            .zip(&ema)
            .map(|(bar, &e)| TrendState::classify(bar.close, e))
            .collect();
        TrendSeries { ema, states }
    }

    fn htf_ema(&self, bars: &[Bar], rule: HtfRule) -> Vec<f64> {
        let resampled = resample(bars, rule);
        let bucket_closes: Vec<f64> = resampled.buckets.iter().map(|b| b.bar.close).collect();
        let bucket_ema = ema_of_series(&bucket_closes, self.ema_period);

        resampled
            .bucket_of
            .iter()
            .map(|&b| match b.checked_sub(1) {
                Some(closed) => bucket_ema[closed],
                None => f64::NAN,
            })
            .collect()
    }
}
