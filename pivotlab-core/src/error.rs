//! Fatal error taxonomy for the engine.
//!
//! Both `InputError` and `ConfigError` are detected before the bar loop starts.
//! A run that fails with either returns no ledger at all. Non-fatal conditions
//! (zero-size positions, degenerate ATR) are recorded as
//! [`SkippedTrade`](crate::engine::SkippedTrade) instead.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Malformed, unordered, or missing price data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("duplicate timestamp {timestamp} at row {index}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("timestamp {timestamp} at row {index} is earlier than previous row ({previous})")]
    OutOfOrder {
        index: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("invalid bar at row {index}: {reason}")]
    InvalidBar { index: usize, reason: String },
}

/// Invalid strategy configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown higher-timeframe rule '{0}' (expected W, M, <n>D or <n>H)")]
    UnknownHtfRule(String),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Any fatal condition that prevents a simulation from starting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
