//! Fixed-fractional risk sizing.
//!
//! `size = floor(equity * risk_per_trade / stop_distance)`. Whole units only.

use crate::engine::SkipReason;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    risk_per_trade: f64,
}

impl PositionSizer {
    pub fn new(risk_per_trade: f64) -> Self {
        Self { risk_per_trade }
    }

    /// Currency budget at risk for the given equity.
    pub fn risk_budget(&self, equity: f64) -> f64 {
        equity * self.risk_per_trade
    }

    pub fn size(&self, equity: f64, stop_distance: f64) -> Result<f64, SkipReason> {
        if !(stop_distance.is_finite() && stop_distance > 0.0) {
            return Err(SkipReason::ZeroStopDistance);
        }
        let size = (self.risk_budget(equity) / stop_distance).floor();
        if !(size.is_finite() && size >= 1.0) {
            return Err(SkipReason::ZeroSize);
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_percent_of_100k_over_five() {
        let sizer = PositionSizer::new(0.01);
        assert_eq!(sizer.size(100_000.0, 5.0), Ok(200.0));
    }

    #[test]
    fn fractional_units_are_floored() {
        let sizer = PositionSizer::new(0.01);
        assert_eq!(sizer.size(100_000.0, 3.0), Ok(333.0));
    }

    #[test]
    fn degenerate_distance_is_skipped() {
        let sizer = PositionSizer::new(0.01);
        assert_eq!(sizer.size(100_000.0, 0.0), Err(SkipReason::ZeroStopDistance));
        assert_eq!(
            sizer.size(100_000.0, f64::NAN),
            Err(SkipReason::ZeroStopDistance)
        );
    }

    #[test]
    fn tiny_budget_rounds_to_zero() {
        let sizer = PositionSizer::new(0.01);
        assert_eq!(sizer.size(100.0, 5.0), Err(SkipReason::ZeroSize));
        assert_eq!(sizer.size(-50.0, 5.0), Err(SkipReason::ZeroSize));
    }
}
