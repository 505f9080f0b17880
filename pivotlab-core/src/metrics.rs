//! Performance metrics: pure functions over the equity curve and ledger.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::Trade;
use crate::engine::{EquityPoint, SimulationResult};

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Aggregate statistics for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub start_equity: f64,
    pub end_equity: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_r: f64,
    pub trade_count: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    pub fn from_result(result: &SimulationResult, periods_per_year: f64) -> Self {
        Self::compute(
            result.initial_equity,
            &result.equity_curve,
            &result.trades,
            periods_per_year,
        )
    }

    /// `initial_equity` is the balance before the first bar; the curve holds
    /// one point per bar after it closes.
    pub fn compute(
        initial_equity: f64,
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        periods_per_year: f64,
    ) -> Self {
        let mut values = Vec::with_capacity(equity_curve.len() + 1);
        values.push(initial_equity);
        values.extend(equity_curve.iter().map(|p| p.equity));

        let end_equity = values.last().copied().unwrap_or(initial_equity);
        let span = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => years_between(first.timestamp, last.timestamp),
            _ => 0.0,
        };

        Self {
            start_equity: initial_equity,
            end_equity,
            total_return: total_return(&values),
            cagr: cagr(initial_equity, end_equity, span),
            sharpe: sharpe_ratio(&values, periods_per_year),
            max_drawdown: max_drawdown(&values),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_r: avg_r(trades),
            trade_count: trades.len(),
            max_consecutive_losses: max_consecutive_losses(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&last)) if equity.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Calendar years between two timestamps.
pub fn years_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_seconds() as f64 / SECONDS_PER_YEAR
}

/// Compound annual growth over `years` (365.25-day years).
///
/// 0.0 when the span is empty or either equity is non-positive.
pub fn cagr(initial: f64, last: f64, years: f64) -> f64 {
    if years <= 0.0 || initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio of per-bar returns, risk-free rate zero.
///
/// mean / sample std * sqrt(periods_per_year). 0.0 for flat equity.
pub fn sharpe_ratio(equity: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * periods_per_year.sqrt()
}

/// Worst peak-to-trough decline as a negative fraction.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of trades with positive net PnL. 0.0 with no trades.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Gross profits / gross losses, capped at 100.0.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let (profit, loss) = trades.iter().fold((0.0, 0.0), |(p, l), t| {
        if t.net_pnl > 0.0 {
            (p + t.net_pnl, l)
        } else {
            (p, l - t.net_pnl)
        }
    });
    if loss < 1e-10 {
        return if profit > 0.0 { 100.0 } else { 0.0 };
    }
    (profit / loss).min(100.0)
}

pub fn avg_r(trades: &[Trade]) -> f64 {
    mean_f64(&trades.iter().map(|t| t.r_multiple).collect::<Vec<_>>())
}

pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    trades
        .iter()
        .fold((0_usize, 0_usize), |(longest, current), t| {
            if t.is_winner() {
                (longest, 0)
            } else {
                (longest.max(current + 1), current + 1)
            }
        })
        .0
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
