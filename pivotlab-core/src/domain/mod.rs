//! Domain types for PivotLab

pub mod bar;
pub mod pivot;
pub mod position;
pub mod series;
pub mod trade;
pub mod zone;

pub use bar::{Bar, Candle};
pub use pivot::{Pivot, PivotKind};
pub use position::{OpenPosition, PositionSide, PositionState, Side};
pub use series::PriceSeries;
pub use trade::{ExitReason, Trade};
pub use zone::{OrderBlockZone, ZoneDirection};
