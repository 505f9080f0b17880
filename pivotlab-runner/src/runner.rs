//! Single-backtest runner.
//!
//! Ties loading, simulation, and metrics together and packages the outcome
//! as a serializable [`BacktestResult`].

use chrono::NaiveDateTime;
use pivotlab_core::domain::{OrderBlockZone, PriceSeries, Trade};
use pivotlab_core::engine::{EquityPoint, SkippedTrade};
use pivotlab_core::{PerformanceMetrics, SimulationEngine, StrategyConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{strategy_run_id, BacktestConfig, RunId};
use crate::data_loader::{dataset_hash, load_csv, LoadError};

/// Errors from a single backtest.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] pivotlab_core::ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
}

/// Current schema version of persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub source: String,
    pub dataset_hash: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub bar_count: usize,
    pub strategy: StrategyConfig,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub zones: Vec<OrderBlockZone>,
    pub skipped: Vec<SkippedTrade>,
    pub pivot_count: usize,
    #[serde(default)]
    pub htf_pivot_count: usize,
    pub signal_count: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load the configured CSV and run the configured strategy over it.
pub fn run_single_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    let loaded = load_csv(&config.data.path, &config.data.date_column)?;
    run_on_series(
        &config.strategy,
        &loaded.series,
        &loaded.dataset_hash,
        &loaded.source,
    )
}

/// Run a strategy over an already-loaded series.
///
/// `dataset_hash` feeds the run id; pass the hash from
/// [`LoadedData`](crate::data_loader::LoadedData) when available.
pub fn run_on_series(
    strategy: &StrategyConfig,
    series: &PriceSeries,
    dataset_hash: &str,
    source: &str,
) -> Result<BacktestResult, RunError> {
    let engine = SimulationEngine::new(strategy.clone())?;
    let strategy = engine.config();
    let result = engine.run(series);
    let metrics = PerformanceMetrics::from_result(&result, strategy.periods_per_year);
    let run_id = strategy_run_id(strategy, dataset_hash);

    info!(
        run_id = %&run_id[..12],
        trades = metrics.trade_count,
        skipped = result.skipped.len(),
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        source: source.to_string(),
        dataset_hash: dataset_hash.to_string(),
        start: series.first().timestamp,
        end: series.last().timestamp,
        bar_count: series.len(),
        strategy: strategy.clone(),
        metrics,
        trades: result.trades,
        equity_curve: result.equity_curve,
        zones: result.zones,
        skipped: result.skipped,
        pivot_count: result.pivots.len(),
        htf_pivot_count: result.htf_pivots.len(),
        signal_count: result.signal_count,
    })
}

/// Convenience for in-memory series: hashes the bars itself.
pub fn run_backtest_from_series(
    strategy: &StrategyConfig,
    series: &PriceSeries,
) -> Result<BacktestResult, RunError> {
    let hash = dataset_hash(series.bars());
    run_on_series(strategy, series, &hash, "memory")
}
