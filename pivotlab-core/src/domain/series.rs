//! PriceSeries: validated, strictly time-ordered bars with O(1) timestamp lookup.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::ops::Index;

use super::bar::Bar;
use crate::error::InputError;

/// An ordered sequence of bars plus a timestamp → position map.
///
/// Construction rejects empty input, duplicate or decreasing timestamps, and
/// bars that fail the OHLC sanity check. Rows are never re-sorted: bad input
/// is reported, not masked.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    bars: Vec<Bar>,
    index_by_time: HashMap<NaiveDateTime, usize>,
}

impl PriceSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, InputError> {
        if bars.is_empty() {
            return Err(InputError::EmptySeries);
        }

        let mut index_by_time = HashMap::with_capacity(bars.len());
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(InputError::InvalidBar {
                    index: i,
                    reason: format!(
                        "open={} high={} low={} close={} volume={:?}",
                        bar.open, bar.high, bar.low, bar.close, bar.volume
                    ),
                });
            }
            if i > 0 {
                let previous = bars[i - 1].timestamp;
                if bar.timestamp == previous {
                    return Err(InputError::DuplicateTimestamp {
                        index: i,
                        timestamp: bar.timestamp,
                    });
                }
                if bar.timestamp < previous {
                    return Err(InputError::OutOfOrder {
                        index: i,
                        timestamp: bar.timestamp,
                        previous,
                    });
                }
            }
            index_by_time.insert(bar.timestamp, i);
        }

        Ok(Self {
            bars,
            index_by_time,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn position_of(&self, timestamp: &NaiveDateTime) -> Option<usize> {
        self.index_by_time.get(timestamp).copied()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// A new series holding the first `len` bars. Used for look-ahead checks.
    pub fn truncated(&self, len: usize) -> Result<Self, InputError> {
        Self::new(self.bars[..len.min(self.bars.len())].to_vec())
    }
}

impl Index<usize> for PriceSeries {
    type Output = Bar;

    fn index(&self, index: usize) -> &Bar {
        &self.bars[index]
    }
}
