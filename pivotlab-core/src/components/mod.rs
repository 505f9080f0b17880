//! Strategy building blocks. Each is a pure function of bar history and
//! configuration, precomputed before the bar loop.

pub mod fractal;
pub mod order_block;
pub mod resample;
pub mod signal;
pub mod sizer;
pub mod stops;
pub mod trend;

pub use fractal::{FractalDetector, FractalIter, PivotTimeline};
pub use order_block::{OrderBlockDetector, ZoneBook};
pub use resample::{resample, HtfBar, HtfRule, Resampled};
pub use signal::{EntrySignal, SignalEvaluator, SignalRules};
pub use sizer::PositionSizer;
pub use stops::{stop_distance, widen_to_structure, StopEngine};
pub use trend::{TrendFilter, TrendSeries, TrendState};
