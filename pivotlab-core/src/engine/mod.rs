//! Simulation engine: precompute detectors, then fold over bars.
//!
//! The engine owns exactly one [`PositionState`](crate::domain::PositionState)
//! per run. Runs share nothing, so independent runs may execute in parallel.

pub mod costs;
pub mod loop_runner;
pub mod state;

pub use costs::{CostModel, RoundTrip};
pub use loop_runner::{simulate, SimulationEngine};
pub use state::{BarSnapshot, EquityPoint, SimulationResult, SkipReason, SkippedTrade};
