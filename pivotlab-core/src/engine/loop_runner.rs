//! Bar-by-bar simulation.
//!
//! Per bar `j`:
//! 1. Protective exits: stop (gap-through fills at the open), then take-profit.
//! 2. Signal evaluation at the close (never on the final bar). Breakout levels
//!    include higher-timeframe pivots when an HTF rule is set.
//! 3. Reversal: an opposing signal closes the open position at the close.
//! 4. Final bar: force-close with `END_OF_DATA`.
//! 5. Entry: if flat and a signal fired, size and open at the close.
//! 6. Trailing stop update from bar `j`'s extreme.
//! 7. Equity point and snapshot.

use tracing::{debug, info, warn};

use crate::components::{
    resample, stop_distance, widen_to_structure, EntrySignal, FractalDetector, HtfRule,
    OrderBlockDetector, PivotTimeline, PositionSizer, SignalEvaluator, SignalRules, StopEngine,
    TrendFilter, ZoneBook,
};
use crate::config::StrategyConfig;
use crate::domain::{
    Bar, ExitReason, OpenPosition, PositionState, PriceSeries, Side, Trade,
};
use crate::error::{ConfigError, SimulationError};

use super::costs::CostModel;
use super::state::{BarSnapshot, EquityPoint, SimulationResult, SkipReason, SkippedTrade};

/// A validated strategy ready to run over any number of series.
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    config: StrategyConfig,
    detector: FractalDetector,
    htf: Option<HtfRule>,
    trend: TrendFilter,
    order_blocks: OrderBlockDetector,
    sizer: PositionSizer,
    costs: CostModel,
}

/// Validate `config`, build `bars` into a series and run it.
pub fn simulate(
    config: &StrategyConfig,
    bars: Vec<Bar>,
) -> Result<SimulationResult, SimulationError> {
    let engine = SimulationEngine::new(config.clone())?;
    let series = PriceSeries::new(bars)?;
    Ok(engine.run(&series))
}

impl SimulationEngine {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = FractalDetector::new(config.left_bars, config.right_bars)?;
        let htf = config.htf()?;
        let trend = TrendFilter::new(config.ema_period, htf);
        let order_blocks =
            OrderBlockDetector::new(config.impulse_bars, config.min_body_ratio, config.lookback);
        let sizer = PositionSizer::new(config.risk_per_trade);
        let costs = CostModel::new(config.slippage_bps, config.commission_bps);
        Ok(Self {
            config,
            detector,
            htf,
            trend,
            order_blocks,
            sizer,
            costs,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn run(&self, series: &PriceSeries) -> SimulationResult {
        let bars = series.bars();
        let n = bars.len();
        self.warn_on_degenerate_data(bars);

        // ── Precompute ──
        let timeline = PivotTimeline::new(self.detector.detect(bars));
        let htf_timeline = PivotTimeline::new(match self.htf {
            Some(rule) => self.detector.detect_resampled(&resample(bars, rule)),
            None => Vec::new(),
        });
        let trend = self.trend.compute(bars);
        let book = ZoneBook::new(
            self.order_blocks.detect(timeline.all(), bars),
            self.config.zone_tolerance_bps,
            self.config.zone_max_age,
        );
        let stops = StopEngine::new(
            bars,
            self.config.atr_period,
            self.config.atr_k,
            self.config.trail_k(),
        );
        let evaluator =
            SignalEvaluator::new(SignalRules::from(&self.config), &timeline, &trend, &book)
                .with_htf_levels(&htf_timeline);

        debug!(
            bars = n,
            pivots = timeline.len(),
            htf_pivots = htf_timeline.len(),
            zones = book.zones().len(),
            "precompute complete"
        );

        // ── Bar loop ──
        let mut run = RunState::new(self.config.initial_equity, n);
        for (j, bar) in bars.iter().enumerate() {
            let is_last = j + 1 == n;

            if let Some((reference, reason)) = self.protective_exit(&run.position, bar) {
                run.close(j, bar, reference, reason, &self.costs);
            }

            let signal = if is_last {
                None
            } else {
                evaluator.evaluate(j, bar)
            };
            if signal.is_some() {
                run.signal_count += 1;
            }

            if let (Some(sig), Some(open_side)) = (signal, run.position.side()) {
                if sig.side == open_side.opposite() {
                    run.close(j, bar, bar.close, ExitReason::SignalReversal, &self.costs);
                }
            }

            if is_last && !run.position.is_flat() {
                run.close(j, bar, bar.close, ExitReason::EndOfData, &self.costs);
            }

            if let Some(sig) = signal {
                if run.position.is_flat() {
                    let structure = if self.config.structure_stop {
                        evaluator.structure_level(sig.side, j)
                    } else {
                        None
                    };
                    self.open(&mut run, j, bar, sig, &stops, structure);
                }
            }

            trail(&mut run.position, j, bar, &stops);
            run.record(j, bar);
        }

        let result = SimulationResult {
            trades: run.trades,
            equity_curve: run.equity_curve,
            snapshots: run.snapshots,
            skipped: run.skipped,
            pivots: timeline.all().to_vec(),
            htf_pivots: htf_timeline.all().to_vec(),
            zones: book.zones().to_vec(),
            signal_count: run.signal_count,
            initial_equity: self.config.initial_equity,
            final_equity: run.equity,
        };
        info!(
            bars = n,
            trades = result.trades.len(),
            skipped = result.skipped.len(),
            final_equity = result.final_equity,
            "simulation complete"
        );
        result
    }

    /// Exit reference price and reason if the open position is stopped or
    /// reaches its target on this bar. The stop wins when both are touched.
    fn protective_exit(&self, state: &PositionState, bar: &Bar) -> Option<(f64, ExitReason)> {
        let (side, pos) = match state {
            PositionState::Flat => return None,
            PositionState::Long(p) => (Side::Long, p),
            PositionState::Short(p) => (Side::Short, p),
        };

        let stop = pos.current_stop;
        let stopped = match side {
            Side::Long if bar.open <= stop => Some(bar.open),
            Side::Long if bar.low <= stop => Some(stop),
            Side::Short if bar.open >= stop => Some(bar.open),
            Side::Short if bar.high >= stop => Some(stop),
            _ => None,
        };
        if let Some(price) = stopped {
            return Some((price, ExitReason::Stop));
        }

        let r = self.config.take_profit_r?;
        let target = pos.entry_reference + side.sign() * r * pos.risk_per_unit();
        let hit = match side {
            Side::Long if bar.open >= target => Some(bar.open),
            Side::Long if bar.high >= target => Some(target),
            Side::Short if bar.open <= target => Some(bar.open),
            Side::Short if bar.low <= target => Some(target),
            _ => None,
        };
        hit.map(|price| (price, ExitReason::TakeProfit))
    }

    fn open(
        &self,
        run: &mut RunState,
        j: usize,
        bar: &Bar,
        signal: EntrySignal,
        stops: &StopEngine,
        structure: Option<f64>,
    ) {
        let side = signal.side;
        let entry_reference = bar.close;
        let entry_price = self.costs.entry_fill(side, entry_reference);

        let Some(atr_stop) = stops.initial_stop(side, entry_price, j) else {
            run.skip(j, side, SkipReason::AtrUnavailable);
            return;
        };
        let initial_stop = widen_to_structure(side, atr_stop, structure);
        let distance = stop_distance(entry_price, initial_stop);
        let size = match self.sizer.size(run.equity, distance) {
            Ok(size) => size,
            Err(reason) => {
                run.skip(j, side, reason);
                return;
            }
        };

        let position = OpenPosition {
            entry_index: j,
            entry_timestamp: bar.timestamp,
            entry_price,
            entry_reference,
            size,
            initial_stop,
            current_stop: initial_stop,
            risk_amount: size * distance,
            extreme_since_entry: entry_reference,
            signal_pivot: signal.pivot,
        };
        debug!(
            bar = j,
            ?side,
            price = entry_price,
            stop = initial_stop,
            size,
            "position opened"
        );
        if run.position.enter(side, position).is_err() {
            warn!(bar = j, "entry ignored: a position is already open");
        }
    }

    fn warn_on_degenerate_data(&self, bars: &[Bar]) {
        let zero_range = bars.iter().filter(|b| b.range() == 0.0).count();
        if zero_range > 0 {
            warn!(
                zero_range,
                total = bars.len(),
                "series contains zero-range bars"
            );
        }
        let warmup = self
            .config
            .atr_period
            .max(self.config.ema_period)
            .max(self.detector.left_bars().saturating_add(self.detector.right_bars()));
        if bars.len() <= warmup {
            warn!(
                bars = bars.len(),
                warmup, "series is shorter than indicator warmup; no trades possible"
            );
        }
    }
}

/// Ratchet the stop from the chandelier level, starting the bar after entry.
/// The entry bar keeps its initial stop, which may sit beyond `k·ATR`.
fn trail(state: &mut PositionState, j: usize, bar: &Bar, stops: &StopEngine) {
    let Some(side) = state.side() else {
        return;
    };
    if !state.position().is_some_and(|p| p.entry_index < j) {
        return;
    }
    state.observe_extreme(bar.high, bar.low);
    let Some(extreme) = state.position().map(|p| p.extreme_since_entry) else {
        return;
    };
    if let Some(candidate) = stops.trail_candidate(side, extreme, j) {
        state.tighten_stop(candidate);
    }
}

/// Mutable state owned by a single run.
struct RunState {
    position: PositionState,
    equity: f64,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    snapshots: Vec<BarSnapshot>,
    skipped: Vec<SkippedTrade>,
    signal_count: usize,
}

impl RunState {
    fn new(initial_equity: f64, bars: usize) -> Self {
        Self {
            position: PositionState::Flat,
            equity: initial_equity,
            trades: Vec::new(),
            equity_curve: Vec::with_capacity(bars),
            snapshots: Vec::with_capacity(bars),
            skipped: Vec::new(),
            signal_count: 0,
        }
    }

    fn close(
        &mut self,
        j: usize,
        bar: &Bar,
        exit_reference: f64,
        reason: ExitReason,
        costs: &CostModel,
    ) {
        let Some((side, pos)) = self.position.exit() else {
            return;
        };
        let settled = costs.settle(side, &pos, exit_reference);
        let r_multiple = if pos.risk_amount > 0.0 {
            settled.net_pnl / pos.risk_amount
        } else {
            0.0
        };
        debug!(
            bar = j,
            ?side,
            ?reason,
            price = settled.exit_price,
            net_pnl = settled.net_pnl,
            "position closed"
        );

        self.equity += settled.net_pnl;
        self.trades.push(Trade {
            side,
            entry_index: pos.entry_index,
            entry_timestamp: pos.entry_timestamp,
            entry_price: pos.entry_price,
            exit_index: j,
            exit_timestamp: bar.timestamp,
            exit_price: settled.exit_price,
            exit_reason: reason,
            size: pos.size,
            initial_stop: pos.initial_stop,
            risk_amount: pos.risk_amount,
            gross_pnl: settled.gross_pnl,
            commission: settled.commission,
            slippage: settled.slippage,
            net_pnl: settled.net_pnl,
            r_multiple,
            bars_held: j - pos.entry_index,
            signal_pivot: pos.signal_pivot,
        });
    }

    fn skip(&mut self, index: usize, side: Side, reason: SkipReason) {
        debug!(bar = index, ?side, ?reason, "entry skipped");
        self.skipped.push(SkippedTrade {
            index,
            side,
            reason,
        });
    }

    fn record(&mut self, j: usize, bar: &Bar) {
        self.equity_curve.push(EquityPoint {
            index: j,
            timestamp: bar.timestamp,
            equity: self.equity,
        });
        let pos = self.position.position();
        self.snapshots.push(BarSnapshot {
            index: j,
            side: self.position.position_side(),
            entry_index: pos.map(|p| p.entry_index),
            current_stop: pos.map(|p| p.current_stop),
        });
    }
}
