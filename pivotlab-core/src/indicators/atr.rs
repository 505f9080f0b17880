//! Average True Range (ATR).
//!
//! TR[t] = max(high-low, |high-prev_close|, |low-prev_close|). TR[0] has no
//! previous close and is left out of the average.
//! Seed: ATR[period] = mean(TR[1..=period]); then
//! ATR[t] = (ATR[t-1] * (period - 1) + TR[t]) / period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_smooth(&true_range(bars), self.period)
    }
}

/// True range per bar. Index 0 is NaN.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        tr[i + 1] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
    }
    tr
}

/// Wilder smoothing, seeded with the mean of the first `period` finite values
/// that follow the leading NaN run. A NaN after the seed ends the output.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    let Some(seed_start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    let seed_end = seed_start.saturating_add(period);
    if seed_end > n {
        return result;
    }

    let window = &values[seed_start..seed_end];
    if window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = window.iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let p = period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        prev = (prev * (p - 1.0) + values[i]) / p;
        result[i] = prev;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn flat_range_bars(n: usize) -> Vec<Bar> {
        // close = 100, high = 100.5, low = 99.5: every TR is exactly 1.0
        let closes = vec![100.0; n];
        make_bars(&closes)
            .into_iter()
            .map(|mut b| {
                b.high = 100.5;
                b.low = 99.5;
                b
            })
            .collect()
    }

    #[test]
    fn first_true_range_is_nan() {
        let tr = true_range(&make_bars(&[100.0, 101.0]));
        assert!(tr[0].is_nan());
        // make_bars: high = 102, low = 99, prev close 100
        assert_approx(tr[1], 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_uses_gap_from_previous_close() {
        let mut bars = make_bars(&[100.0, 100.0]);
        bars[1].high = 110.0;
        bars[1].low = 108.0;
        let tr = true_range(&bars);
        assert_approx(tr[1], 10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_true_range_gives_constant_atr() {
        let bars = flat_range_bars(40);
        let atr = Atr::new(14).compute(&bars);
        for v in atr.iter().take(14) {
            assert!(v.is_nan());
        }
        for v in atr.iter().skip(14) {
            assert_approx(*v, 1.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn wilder_known_values() {
        // seed at index 2 = mean(2, 4) = 3; next = (3 + 6) / 2 = 4.5
        let result = wilder_smooth(&[f64::NAN, 2.0, 4.0, 6.0], 2);
        assert!(result[1].is_nan());
        assert_approx(result[2], 3.0, DEFAULT_EPSILON);
        assert_approx(result[3], 4.5, DEFAULT_EPSILON);
    }

    #[test]
    fn too_short_for_seed() {
        let atr = Atr::new(14).compute(&flat_range_bars(14));
        assert!(atr.iter().all(|v| v.is_nan()));
    }
}
