//! Fractal pivot detection.
//!
//! Bar `i` is a HIGH pivot when its high is strictly greater than every other
//! high in `[i - left_bars, i + right_bars]`; LOW is the mirror on lows. Ties
//! reject the candidate. A pivot needs `right_bars` of future data, so it is
//! confirmed at `i + right_bars` and must not be used before then.
//!
//! On resampled bars the same rule runs over buckets. A bucket pivot becomes
//! visible on the first base bar after its confirming bucket has closed.

use super::resample::Resampled;
use crate::domain::{Bar, Pivot, PivotKind};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractalDetector {
    left_bars: usize,
    right_bars: usize,
}

impl FractalDetector {
    pub fn new(left_bars: usize, right_bars: usize) -> Result<Self, ConfigError> {
        if left_bars == 0 {
            return Err(ConfigError::invalid("left_bars", "must be >= 1"));
        }
        if right_bars == 0 {
            return Err(ConfigError::invalid("right_bars", "must be >= 1"));
        }
        Ok(Self {
            left_bars,
            right_bars,
        })
    }

    pub fn left_bars(&self) -> usize {
        self.left_bars
    }

    pub fn right_bars(&self) -> usize {
        self.right_bars
    }

    /// Lazy pass over `bars`. Each call starts a fresh scan.
    pub fn iter<'a>(&self, bars: &'a [Bar]) -> FractalIter<'a> {
        FractalIter {
            bars,
            left: self.left_bars,
            right: self.right_bars,
            cursor: self.left_bars,
            pending_low: None,
        }
    }

    pub fn detect(&self, bars: &[Bar]) -> Vec<Pivot> {
        self.iter(bars).collect()
    }

    /// Pivots of the bucket bars, mapped back onto base-bar indices.
    ///
    /// `index` is the bucket's first base bar and `confirmed_at_index` the
    /// bar after the confirming bucket's last one. A pivot confirmed by the
    /// final bucket is never visible, since that bucket may still be forming.
    pub fn detect_resampled(&self, resampled: &Resampled) -> Vec<Pivot> {
        let bucket_bars: Vec<Bar> = resampled.buckets.iter().map(|b| b.bar.clone()).collect();
        self.iter(&bucket_bars)
            .map(|p| {
                let bucket = &resampled.buckets[p.index];
                let confirming = &resampled.buckets[p.confirmed_at_index];
                Pivot {
                    index: bucket.first_index,
                    timestamp: bucket.bar.timestamp,
                    confirmed_at_index: confirming.last_index + 1,
                    ..p
                }
            })
            .collect()
    }
}

/// Pivots in index order, HIGH before LOW when one bar is both.
#[derive(Debug, Clone)]
pub struct FractalIter<'a> {
    bars: &'a [Bar],
    left: usize,
    right: usize,
    cursor: usize,
    pending_low: Option<Pivot>,
}

impl FractalIter<'_> {
    fn is_extreme(&self, i: usize, beats: impl Fn(&Bar, &Bar) -> bool) -> bool {
        let centre = &self.bars[i];
        (i - self.left..=i + self.right)
            .filter(|&k| k != i)
            .all(|k| beats(centre, &self.bars[k]))
    }

    fn pivot(&self, i: usize, kind: PivotKind) -> Pivot {
        let bar = &self.bars[i];
        Pivot {
            index: i,
            timestamp: bar.timestamp,
            price: match kind {
                PivotKind::High => bar.high,
                PivotKind::Low => bar.low,
            },
            kind,
            confirmed_at_index: i + self.right,
        }
    }
}

impl Iterator for FractalIter<'_> {
    type Item = Pivot;

    fn next(&mut self) -> Option<Pivot> {
        if let Some(low) = self.pending_low.take() {
            return Some(low);
        }

        while self.cursor.saturating_add(self.right) < self.bars.len() {
            let i = self.cursor;
            self.cursor += 1;

            let high = self.is_extreme(i, |c, o| c.high > o.high);
            let low = self.is_extreme(i, |c, o| c.low < o.low);
            match (high, low) {
                (true, true) => {
                    self.pending_low = Some(self.pivot(i, PivotKind::Low));
                    return Some(self.pivot(i, PivotKind::High));
                }
                (true, false) => return Some(self.pivot(i, PivotKind::High)),
                (false, true) => return Some(self.pivot(i, PivotKind::Low)),
                (false, false) => {}
            }
        }
        None
    }
}

/// Detected pivots indexed by confirmation bar.
///
/// `confirmed_at_index` is non-decreasing in detector output, so every query
/// is a binary search.
#[derive(Debug, Clone, Default)]
pub struct PivotTimeline {
    pivots: Vec<Pivot>,
}

impl PivotTimeline {
    pub fn new(mut pivots: Vec<Pivot>) -> Self {
        pivots.sort_by_key(|p| p.confirmed_at_index);
        Self { pivots }
    }

    pub fn all(&self) -> &[Pivot] {
        &self.pivots
    }

    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    /// Pivots a decision at bar `j` may use.
    pub fn visible_at(&self, j: usize) -> &[Pivot] {
        let end = self.pivots.partition_point(|p| p.is_visible_at(j));
        &self.pivots[..end]
    }

    /// Most recently confirmed pivot of `kind` visible at bar `j`.
    pub fn latest(&self, kind: PivotKind, j: usize) -> Option<&Pivot> {
        self.visible_at(j).iter().rev().find(|p| p.kind == kind)
    }

    /// Highest HIGH or lowest LOW confirmed in `[from, to]`.
    pub fn extreme_between(&self, kind: PivotKind, from: usize, to: usize) -> Option<&Pivot> {
        let candidates = self
            .confirmed_between(from, to)
            .iter()
            .filter(move |p| p.kind == kind);
        match kind {
            PivotKind::High => candidates.max_by(|a, b| a.price.total_cmp(&b.price)),
            PivotKind::Low => candidates.min_by(|a, b| a.price.total_cmp(&b.price)),
        }
    }

    /// Pivots whose confirmation happens exactly at bar `j`.
    pub fn confirmed_at(&self, j: usize) -> &[Pivot] {
        self.confirmed_between(j, j)
    }

    /// Pivots confirmed in `[from, to]`.
    pub fn confirmed_between(&self, from: usize, to: usize) -> &[Pivot] {
        if from > to {
            return &[];
        }
        let start = self.pivots.partition_point(|p| p.confirmed_at_index < from);
        let end = self.pivots.partition_point(|p| p.confirmed_at_index <= to);
        &self.pivots[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars_hl(hl: &[(f64, f64)]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        hl.iter()
            .enumerate()
            .map(|(i, &(h, l))| {
                let mid = (h + l) / 2.0;
                Bar::new(base + chrono::Duration::days(i as i64), mid, h, l, mid)
            })
            .collect()
    }

    #[test]
    fn zero_window_rejected() {
        assert!(FractalDetector::new(0, 2).is_err());
        assert!(FractalDetector::new(2, 0).is_err());
    }

    #[test]
    fn single_high_pivot() {
        let bars = bars_hl(&[
            (10.0, 9.0),
            (11.0, 9.5),
            (15.0, 10.0),
            (12.0, 9.8),
            (11.0, 9.7),
        ]);
        let pivots = FractalDetector::new(2, 2).unwrap().detect(&bars);
        let highs: Vec<_> = pivots
            .iter()
            .filter(|p| p.kind == PivotKind::High)
            .collect();
        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].index, 2);
        assert_eq!(highs[0].price, 15.0);
        assert_eq!(highs[0].confirmed_at_index, 4);
    }

    #[test]
    fn tie_rejects_candidate() {
        let bars = bars_hl(&[
            (10.0, 9.0),
            (15.0, 9.5),
            (15.0, 10.0),
            (12.0, 9.8),
            (11.0, 9.7),
        ]);
        let pivots = FractalDetector::new(1, 1).unwrap().detect(&bars);
        assert!(pivots.iter().all(|p| p.kind != PivotKind::High));
    }

    #[test]
    fn edges_never_pivot() {
        // Extremes at the first and last bars have no full window.
        let bars = bars_hl(&[(20.0, 1.0), (12.0, 9.0), (13.0, 9.0), (14.0, 9.0), (30.0, 0.5)]);
        let pivots = FractalDetector::new(2, 2).unwrap().detect(&bars);
        assert!(pivots.iter().all(|p| p.index != 0 && p.index != 4));
    }

    #[test]
    fn outside_bar_yields_high_then_low() {
        let bars = bars_hl(&[(10.0, 9.0), (20.0, 1.0), (10.0, 9.0)]);
        let pivots = FractalDetector::new(1, 1).unwrap().detect(&bars);
        assert_eq!(pivots.len(), 2);
        assert_eq!(pivots[0].kind, PivotKind::High);
        assert_eq!(pivots[1].kind, PivotKind::Low);
        assert_eq!(pivots[0].index, pivots[1].index);
    }

    #[test]
    fn iterator_is_restartable() {
        let bars = bars_hl(&[(10.0, 9.0), (20.0, 1.0), (10.0, 9.0), (25.0, 8.0), (9.0, 8.5)]);
        let detector = FractalDetector::new(1, 1).unwrap();
        let first: Vec<_> = detector.iter(&bars).collect();
        let second: Vec<_> = detector.iter(&bars).collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn short_series_has_no_pivots() {
        let bars = bars_hl(&[(10.0, 9.0), (12.0, 9.0), (11.0, 9.0)]);
        assert!(FractalDetector::new(2, 2).unwrap().detect(&bars).is_empty());
    }

    #[test]
    fn timeline_queries() {
        let bars = bars_hl(&[
            (10.0, 9.0),
            (11.0, 9.5),
            (15.0, 10.0),
            (12.0, 9.8),
            (11.0, 7.0),
            (12.0, 9.0),
            (13.0, 9.5),
        ]);
        let timeline = PivotTimeline::new(FractalDetector::new(2, 2).unwrap().detect(&bars));
        // HIGH at 2 (confirmed 4), LOW at 4 (confirmed 6)
        assert_eq!(timeline.len(), 2);
        assert!(timeline.visible_at(3).is_empty());
        assert_eq!(timeline.visible_at(4).len(), 1);
        assert_eq!(timeline.confirmed_at(6)[0].kind, PivotKind::Low);
        assert!(timeline.confirmed_at(5).is_empty());
        assert_eq!(timeline.confirmed_between(0, 6).len(), 2);
        assert!(timeline.confirmed_between(6, 5).is_empty());

        assert!(timeline.latest(PivotKind::Low, 5).is_none());
        assert_eq!(timeline.latest(PivotKind::Low, 6).unwrap().index, 4);
        assert_eq!(timeline.latest(PivotKind::High, 6).unwrap().price, 15.0);
    }

    #[test]
    fn extreme_between_picks_highest_high_and_lowest_low() {
        let bars = bars_hl(&[
            (10.0, 9.0),
            (14.0, 8.0),
            (11.0, 9.0),
            (16.0, 6.0),
            (12.0, 9.0),
            (13.0, 9.5),
            (12.5, 9.2),
        ]);
        // HIGH 14 at 1 (confirmed 2), HIGH 16 and LOW 6 at 3 (confirmed 4),
        // HIGH 13 at 5 (confirmed 6)
        let timeline = PivotTimeline::new(FractalDetector::new(1, 1).unwrap().detect(&bars));
        assert_eq!(timeline.extreme_between(PivotKind::High, 0, 6).unwrap().price, 16.0);
        assert_eq!(timeline.extreme_between(PivotKind::High, 5, 6).unwrap().price, 13.0);
        assert_eq!(timeline.extreme_between(PivotKind::Low, 0, 6).unwrap().price, 6.0);
        assert!(timeline.extreme_between(PivotKind::Low, 5, 6).is_none());
    }

    #[test]
    fn huge_window_finds_nothing() {
        let bars = bars_hl(&[(10.0, 9.0), (20.0, 1.0), (10.0, 9.0)]);
        assert!(FractalDetector::new(1, usize::MAX).unwrap().detect(&bars).is_empty());
        assert!(FractalDetector::new(usize::MAX, 1).unwrap().detect(&bars).is_empty());
    }

    #[test]
    fn resampled_pivot_waits_for_confirming_bucket_to_close() {
        use crate::components::resample::{resample, HtfRule};

        // 3-day buckets; the one holding bar 3 has the extreme high.
        let highs = [10.0, 10.5, 10.2, 14.0, 13.0, 12.0, 11.0, 11.5, 11.2, 10.8, 10.6, 10.9];
        let bars = bars_hl(&highs.iter().map(|&h| (h, h - 2.0)).collect::<Vec<_>>());
        let resampled = resample(&bars, HtfRule::Days(3));
        assert!(resampled.buckets.len() >= 3);

        let pivots = FractalDetector::new(1, 1).unwrap().detect_resampled(&resampled);
        let high = pivots.iter().find(|p| p.kind == PivotKind::High).unwrap();
        assert_eq!(high.price, 14.0);
        let pivot_bucket = resampled.bucket_of[3];
        assert_eq!(high.index, resampled.buckets[pivot_bucket].first_index);
        assert_eq!(
            high.confirmed_at_index,
            resampled.buckets[pivot_bucket + 1].last_index + 1
        );
        assert!(high.confirmed_at_index > 3);
    }
}
