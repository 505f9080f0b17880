//! Pivot: a confirmed fractal extreme.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PivotKind {
    High,
    Low,
}

/// A local extreme at `index`, visible to consumers only from `confirmed_at_index`.
///
/// `confirmed_at_index == index + right_bars` holds for pivots produced by
/// [`FractalDetector::detect`](crate::components::fractal::FractalDetector::detect).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub kind: PivotKind,
    pub confirmed_at_index: usize,
}

impl Pivot {
    /// Whether a decision taken at bar `bar_index` may use this pivot.
    pub fn is_visible_at(&self, bar_index: usize) -> bool {
        self.confirmed_at_index <= bar_index
    }
}
