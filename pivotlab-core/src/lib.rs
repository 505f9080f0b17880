//! PivotLab Core: fractal pivot simulation engine.
//!
//! This crate contains everything a simulation needs and performs no I/O:
//! - Domain types (bars, price series, pivots, zones, positions, trades)
//! - Indicators (EMA, ATR) with NaN warmup
//! - Fractal pivot detection with confirmation lag
//! - EMA trend filter, optionally on a higher timeframe
//! - Order-block zone detection
//! - ATR initial and chandelier trailing stops, risk-based sizing
//! - The bar-by-bar simulation state machine and performance metrics
//!
//! No decision at bar t uses data from bar t+1 or later. Detectors are
//! precomputed over the whole series, but every output carries the bar index
//! from which it may be used.

pub mod components;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod metrics;

pub use config::{SignalMode, StrategyConfig};
pub use engine::{simulate, SimulationEngine, SimulationResult};
pub use error::{ConfigError, InputError, SimulationError};
pub use metrics::PerformanceMetrics;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the runner moves across rayon workers is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::Pivot>();
        require_sync::<domain::Pivot>();
        require_send::<domain::OrderBlockZone>();
        require_sync::<domain::OrderBlockZone>();
        require_send::<domain::PositionState>();
        require_sync::<domain::PositionState>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();

        require_send::<StrategyConfig>();
        require_sync::<StrategyConfig>();
        require_send::<SimulationEngine>();
        require_sync::<SimulationEngine>();
        require_send::<SimulationResult>();
        require_sync::<SimulationResult>();
        require_send::<PerformanceMetrics>();
        require_sync::<PerformanceMetrics>();
        require_send::<SimulationError>();
        require_sync::<SimulationError>();
    }
}
