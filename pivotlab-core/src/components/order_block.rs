//! Order-block zones.
//!
//! For each pivot, look forward up to `lookback` bars for the first run of
//! `impulse_bars` same-colour candles that is strong enough (mean body ratio)
//! and closes through the pivot. A HIGH pivot broken upward by a bullish run
//! leaves a demand zone; a LOW pivot broken downward by a bearish run leaves a
//! supply zone. The zone is the range of the last opposing-colour candle before
//! the run.

use crate::domain::{Bar, Candle, OrderBlockZone, Pivot, PivotKind, ZoneDirection};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderBlockDetector {
    pub impulse_bars: usize,
    pub min_body_ratio: f64,
    pub lookback: usize,
}

impl OrderBlockDetector {
    pub fn new(impulse_bars: usize, min_body_ratio: f64, lookback: usize) -> Self {
        Self {
            impulse_bars,
            min_body_ratio,
            lookback,
        }
    }

    /// Zones in pivot order. At most one per pivot.
    pub fn detect(&self, pivots: &[Pivot], bars: &[Bar]) -> Vec<OrderBlockZone> {
        pivots
            .iter()
            .filter_map(|p| self.zone_for(p, bars))
            .collect()
    }

    fn zone_for(&self, pivot: &Pivot, bars: &[Bar]) -> Option<OrderBlockZone> {
        if self.impulse_bars == 0 || bars.is_empty() {
            return None;
        }
        let (run_colour, direction) = match pivot.kind {
            PivotKind::High => (Candle::Bullish, ZoneDirection::Bullish),
            PivotKind::Low => (Candle::Bearish, ZoneDirection::Bearish),
        };
        let breaks = |bar: &Bar| match pivot.kind {
            PivotKind::High => bar.close > pivot.price,
            PivotKind::Low => bar.close < pivot.price,
        };

        let window_end = pivot.index.saturating_add(self.lookback).min(bars.len() - 1);
        let mut start = pivot.index + 1;
        while start.saturating_add(self.impulse_bars - 1) <= window_end {
            let run = &bars[start..start + self.impulse_bars];
            if self.is_impulse(run, run_colour) && run.iter().any(breaks) {
                let end_index = start + self.impulse_bars - 1;
                return anchor_before(bars, pivot.index, start, run_colour).map(|anchor| {
                    OrderBlockZone {
                        start_index: anchor,
                        end_index,
                        formation_index: end_index.max(pivot.confirmed_at_index),
                        price_low: bars[anchor].low,
                        price_high: bars[anchor].high,
                        direction,
                        origin_pivot: *pivot,
                    }
                });
            }
            start += 1;
        }
        None
    }

    fn is_impulse(&self, run: &[Bar], colour: Candle) -> bool {
        if !run.iter().all(|b| b.candle() == colour) {
            return false;
        }
        let mean_body = run.iter().map(Bar::body_ratio).sum::<f64>() / run.len() as f64;
        mean_body >= self.min_body_ratio
    }
}

/// Last bar of the opposite colour in `[floor, run_start)`, scanning backward.
fn anchor_before(bars: &[Bar], floor: usize, run_start: usize, run_colour: Candle) -> Option<usize> {
    let opposing = match run_colour {
        Candle::Bullish => Candle::Bearish,
        Candle::Bearish => Candle::Bullish,
        Candle::Doji => return None,
    };
    (floor..run_start).rev().find(|&k| bars[k].candle() == opposing)
}

/// Detected zones ordered by formation, queried by bar.
#[derive(Debug, Clone, Default)]
pub struct ZoneBook {
    zones: Vec<OrderBlockZone>,
    tolerance_bps: f64,
    max_age: Option<usize>,
}

impl ZoneBook {
    pub fn new(mut zones: Vec<OrderBlockZone>, tolerance_bps: f64, max_age: Option<usize>) -> Self {
        zones.sort_by_key(|z| z.formation_index);
        Self {
            zones,
            tolerance_bps,
            max_age,
        }
    }

    pub fn zones(&self) -> &[OrderBlockZone] {
        &self.zones
    }

    /// Zones formed by bar `j` and not older than `max_age`.
    pub fn active_at(&self, j: usize) -> impl Iterator<Item = &OrderBlockZone> + '_ {
        let end = self.zones.partition_point(|z| z.formation_index <= j);
        let max_age = self.max_age;
        self.zones[..end]
            .iter()
            .filter(move |z| max_age.map_or(true, |age| j - z.formation_index <= age))
    }

    /// Whether `price` is inside or near an active zone of `direction` at bar `j`.
    pub fn is_near(&self, direction: ZoneDirection, price: f64, j: usize) -> bool {
        self.active_at(j)
            .any(|z| z.direction == direction && z.contains_near(price, self.tolerance_bps))
    }
}
