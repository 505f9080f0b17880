//! PivotLab Runner: backtest orchestration around `pivotlab-core`.
//!
//! This crate provides:
//! - CSV bar loading with content hashing
//! - TOML backtest configuration with content-addressed run ids
//! - Single-backtest runner producing a serializable result
//! - Artifact export (JSON summary, trade/equity/zone CSVs)
//! - Parallel parameter sweeps with metric ranking

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use data_loader::{load_csv, LoadError, LoadedData};
pub use export::{load_artifacts, save_artifacts};
pub use runner::{
    run_backtest_from_series, run_on_series, run_single_backtest, BacktestResult, RunError,
    SCHEMA_VERSION,
};
pub use sweep::{ParamGrid, ParamSweep, RankMetric, SweepError, SweepResults, SweepRow};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<ParamGrid>();
        assert_sync::<ParamGrid>();
    }

    #[test]
    fn sweep_is_sync() {
        assert_sync::<ParamSweep<'static>>();
        assert_send::<SweepResults>();
    }
}
