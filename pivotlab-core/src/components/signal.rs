//! Entry signal evaluation.
//!
//! Signals are evaluated at a bar's close using only pivots confirmed by that
//! bar, the bar's trend state, and zones already formed. Evaluation never
//! fails: no signal is `None`.
//!
//! In breakout mode a higher-timeframe pivot timeline, when supplied, raises
//! the long level to the latest HTF HIGH and lowers the short level to the
//! latest HTF LOW.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fractal::PivotTimeline;
use super::order_block::ZoneBook;
use super::trend::{TrendSeries, TrendState};
use crate::config::{SignalMode, StrategyConfig};
use crate::domain::{Bar, Pivot, PivotKind, Side, ZoneDirection};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub side: Side,
    /// Pivot that triggered the signal (pivot mode) or the broken level
    /// (breakout mode).
    pub pivot: Option<Pivot>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRules {
    pub mode: SignalMode,
    pub breakout_lookback: usize,
    pub allow_long: bool,
    pub allow_short: bool,
    pub filter_trades: bool,
}

impl From<&StrategyConfig> for SignalRules {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            mode: config.signal_mode,
            breakout_lookback: config.breakout_lookback,
            allow_long: config.allow_long,
            allow_short: config.allow_short,
            filter_trades: config.filter_trades,
        }
    }
}

pub struct SignalEvaluator<'a> {
    rules: SignalRules,
    timeline: &'a PivotTimeline,
    htf_timeline: Option<&'a PivotTimeline>,
    trend: &'a TrendSeries,
    zones: &'a ZoneBook,
}

impl<'a> SignalEvaluator<'a> {
    pub fn new(
        rules: SignalRules,
        timeline: &'a PivotTimeline,
        trend: &'a TrendSeries,
        zones: &'a ZoneBook,
    ) -> Self {
        Self {
            rules,
            timeline,
            htf_timeline: None,
            trend,
            zones,
        }
    }

    /// Fold higher-timeframe pivots into breakout levels.
    pub fn with_htf_levels(mut self, htf_timeline: &'a PivotTimeline) -> Self {
        self.htf_timeline = Some(htf_timeline);
        self
    }

    pub fn evaluate(&self, j: usize, bar: &Bar) -> Option<EntrySignal> {
        let side = match self.trend.state_at(j) {
            TrendState::Up if self.rules.allow_long => Side::Long,
            TrendState::Down if self.rules.allow_short => Side::Short,
            _ => return None,
        };

        let trigger = match self.rules.mode {
            SignalMode::Pivot => self.pivot_trigger(side, j)?,
            SignalMode::Breakout => self.breakout_trigger(side, j, bar.close)?,
        };

        if self.rules.filter_trades {
            let direction = match side {
                Side::Long => ZoneDirection::Bullish,
                Side::Short => ZoneDirection::Bearish,
            };
            if !self.zones.is_near(direction, bar.close, j) {
                debug!(bar = j, ?side, "signal blocked: no matching zone");
                return None;
            }
        }

        Some(EntrySignal {
            side,
            pivot: Some(trigger),
        })
    }

    fn pivot_trigger(&self, side: Side, j: usize) -> Option<Pivot> {
        let wanted = match side {
            Side::Long => PivotKind::Low,
            Side::Short => PivotKind::High,
        };
        self.timeline
            .confirmed_at(j)
            .iter()
            .find(|p| p.kind == wanted)
            .copied()
    }

    fn breakout_trigger(&self, side: Side, j: usize, close: f64) -> Option<Pivot> {
        let kind = match side {
            Side::Long => PivotKind::High,
            Side::Short => PivotKind::Low,
        };
        let mut level = *self.window_extreme(kind, j)?;
        if let Some(htf) = self.htf_timeline.and_then(|t| t.latest(kind, j)) {
            let stricter = match side {
                Side::Long => htf.price > level.price,
                Side::Short => htf.price < level.price,
            };
            if stricter {
                level = *htf;
            }
        }
        let broken = match side {
            Side::Long => close > level.price,
            Side::Short => close < level.price,
        };
        broken.then_some(level)
    }

    /// Opposite-side structure for an entry at bar `j`: the lowest LOW in the
    /// breakout window for a long, the highest HIGH for a short.
    pub fn structure_level(&self, side: Side, j: usize) -> Option<f64> {
        let kind = match side {
            Side::Long => PivotKind::Low,
            Side::Short => PivotKind::High,
        };
        self.window_extreme(kind, j).map(|p| p.price)
    }

    fn window_extreme(&self, kind: PivotKind, j: usize) -> Option<&Pivot> {
        let from = (j + 1).saturating_sub(self.rules.breakout_lookback);
        self.timeline.extreme_between(kind, from, j)
    }
}
