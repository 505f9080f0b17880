//! OrderBlockZone: a candidate supply/demand band.

use serde::{Deserialize, Serialize};

use super::pivot::Pivot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneDirection {
    /// Demand: last down candle before an impulsive up-move.
    Bullish,
    /// Supply: last up candle before an impulsive down-move.
    Bearish,
}

/// A price band anchored at the last opposing-colour bar before an impulse.
///
/// `start_index` is the anchor bar, `end_index` the last bar of the impulse
/// run. The zone may be used from `formation_index` onward, which is never
/// earlier than the origin pivot's confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlockZone {
    pub start_index: usize,
    pub end_index: usize,
    pub formation_index: usize,
    pub price_low: f64,
    pub price_high: f64,
    pub direction: ZoneDirection,
    pub origin_pivot: Pivot,
}

impl OrderBlockZone {
    pub fn is_formed_at(&self, bar_index: usize) -> bool {
        self.formation_index <= bar_index
    }

    /// Whether `price` falls inside the band widened by `tolerance_bps` on each side.
    pub fn contains_near(&self, price: f64, tolerance_bps: f64) -> bool {
        let tol = tolerance_bps / 10_000.0;
        price >= self.price_low * (1.0 - tol) && price <= self.price_high * (1.0 + tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PivotKind;
    use chrono::NaiveDate;

    fn zone() -> OrderBlockZone {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        OrderBlockZone {
            start_index: 4,
            end_index: 7,
            formation_index: 7,
            price_low: 100.0,
            price_high: 102.0,
            direction: ZoneDirection::Bullish,
            origin_pivot: Pivot {
                index: 2,
                timestamp: ts,
                price: 103.0,
                kind: PivotKind::High,
                confirmed_at_index: 4,
            },
        }
    }

    #[test]
    fn tolerance_widens_band() {
        let z = zone();
        assert!(z.contains_near(101.0, 0.0));
        assert!(!z.contains_near(102.1, 0.0));
        // 100 bps of 102 = 1.02
        assert!(z.contains_near(102.9, 100.0));
        assert!(z.contains_near(99.1, 100.0));
        assert!(!z.contains_near(98.9, 100.0));
    }

    #[test]
    fn formation_gates_visibility() {
        let z = zone();
        assert!(!z.is_formed_at(6));
        assert!(z.is_formed_at(7));
    }
}
