//! Strategy configuration.
//!
//! Every knob of a simulation lives in [`StrategyConfig`]. It deserializes with
//! `#[serde(default)]`, so a TOML `[strategy]` table only needs the fields it
//! overrides. [`StrategyConfig::validate`] runs before any bar is processed.

use serde::{Deserialize, Serialize};

use crate::components::resample::HtfRule;
use crate::error::ConfigError;

/// How entry candidates are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    /// A LOW pivot confirmed on this bar triggers long, a HIGH pivot short.
    #[default]
    Pivot,
    /// Close beyond the extreme of recently confirmed pivots.
    Breakout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    // ── Fractals ──
    pub left_bars: usize,
    pub right_bars: usize,

    // ── Trend ──
    pub ema_period: usize,
    pub use_htf: bool,
    pub htf_rule: String,

    // ── Stops ──
    pub atr_period: usize,
    pub atr_k: f64,
    /// Chandelier multiple. `None` means same as `atr_k`.
    pub atr_trail_k: Option<f64>,
    /// Optional profit target in multiples of initial risk.
    pub take_profit_r: Option<f64>,
    /// Widen the initial stop to the opposite swing in the breakout window.
    pub structure_stop: bool,

    // ── Sizing & costs ──
    pub initial_equity: f64,
    pub risk_per_trade: f64,
    pub slippage_bps: f64,
    pub commission_bps: f64,

    // ── Order blocks ──
    pub impulse_bars: usize,
    pub min_body_ratio: f64,
    pub lookback: usize,
    pub filter_trades: bool,
    pub zone_tolerance_bps: f64,
    pub zone_max_age: Option<usize>,

    // ── Signals ──
    pub signal_mode: SignalMode,
    pub breakout_lookback: usize,
    pub allow_long: bool,
    pub allow_short: bool,

    // ── Reporting ──
    pub periods_per_year: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            left_bars: 2,
            right_bars: 2,
            ema_period: 50,
            use_htf: false,
            htf_rule: "W".to_string(),
            atr_period: 14,
            atr_k: 2.0,
            atr_trail_k: None,
            take_profit_r: None,
            structure_stop: false,
            initial_equity: 100_000.0,
            risk_per_trade: 0.01,
            slippage_bps: 2.0,
            commission_bps: 10.0,
            impulse_bars: 3,
            min_body_ratio: 0.3,
            lookback: 20,
            filter_trades: false,
            zone_tolerance_bps: 50.0,
            zone_max_age: None,
            signal_mode: SignalMode::Pivot,
            breakout_lookback: 20,
            allow_long: true,
            allow_short: true,
            periods_per_year: 252.0,
        }
    }
}

/// Upper bound for every bar-count parameter.
pub const MAX_COUNT: usize = u32::MAX as usize;

/// Names accepted by [`StrategyConfig::set_numeric`].
pub const NUMERIC_FIELDS: &[&str] = &[
    "left_bars",
    "right_bars",
    "ema_period",
    "atr_period",
    "atr_k",
    "atr_trail_k",
    "take_profit_r",
    "initial_equity",
    "risk_per_trade",
    "slippage_bps",
    "commission_bps",
    "impulse_bars",
    "min_body_ratio",
    "lookback",
    "zone_tolerance_bps",
    "zone_max_age",
    "breakout_lookback",
    "periods_per_year",
];

impl StrategyConfig {
    /// Effective trailing multiple.
    pub fn trail_k(&self) -> f64 {
        self.atr_trail_k.unwrap_or(self.atr_k)
    }

    /// Parsed higher-timeframe rule, or `None` when `use_htf` is off.
    pub fn htf(&self) -> Result<Option<HtfRule>, ConfigError> {
        if !self.use_htf {
            return Ok(None);
        }
        self.htf_rule.parse().map(Some)
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        count("left_bars", self.left_bars)?;
        count("right_bars", self.right_bars)?;
        count("ema_period", self.ema_period)?;
        count("atr_period", self.atr_period)?;
        count("impulse_bars", self.impulse_bars)?;
        count("lookback", self.lookback)?;
        count("breakout_lookback", self.breakout_lookback)?;
        if let Some(age) = self.zone_max_age {
            if age > MAX_COUNT {
                return Err(ConfigError::invalid(
                    "zone_max_age",
                    format!("must be <= {MAX_COUNT}, got {age}"),
                ));
            }
        }

        positive("atr_k", self.atr_k)?;
        if let Some(k) = self.atr_trail_k {
            positive("atr_trail_k", k)?;
        }
        if let Some(r) = self.take_profit_r {
            positive("take_profit_r", r)?;
        }
        positive("initial_equity", self.initial_equity)?;
        positive("periods_per_year", self.periods_per_year)?;

        if !(self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0) {
            return Err(ConfigError::invalid(
                "risk_per_trade",
                format!("must be in (0, 1], got {}", self.risk_per_trade),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_body_ratio) {
            return Err(ConfigError::invalid(
                "min_body_ratio",
                format!("must be in [0, 1], got {}", self.min_body_ratio),
            ));
        }
        non_negative("slippage_bps", self.slippage_bps)?;
        non_negative("commission_bps", self.commission_bps)?;
        non_negative("zone_tolerance_bps", self.zone_tolerance_bps)?;

        self.htf()?;
        Ok(())
    }

    /// Set a numeric field by name. Integer fields reject fractional values.
    /// `atr_trail_k`, `take_profit_r` and `zone_max_age` become `Some(value)`.
    pub fn set_numeric(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        match name {
            "left_bars" => self.left_bars = as_count("left_bars", value)?,
            "right_bars" => self.right_bars = as_count("right_bars", value)?,
            "ema_period" => self.ema_period = as_count("ema_period", value)?,
            "atr_period" => self.atr_period = as_count("atr_period", value)?,
            "impulse_bars" => self.impulse_bars = as_count("impulse_bars", value)?,
            "lookback" => self.lookback = as_count("lookback", value)?,
            "breakout_lookback" => {
                self.breakout_lookback = as_count("breakout_lookback", value)?
            }
            "zone_max_age" => self.zone_max_age = Some(as_count("zone_max_age", value)?),
            "atr_k" => self.atr_k = value,
            "atr_trail_k" => self.atr_trail_k = Some(value),
            "take_profit_r" => self.take_profit_r = Some(value),
            "initial_equity" => self.initial_equity = value,
            "risk_per_trade" => self.risk_per_trade = value,
            "slippage_bps" => self.slippage_bps = value,
            "commission_bps" => self.commission_bps = value,
            "min_body_ratio" => self.min_body_ratio = value,
            "zone_tolerance_bps" => self.zone_tolerance_bps = value,
            "periods_per_year" => self.periods_per_year = value,
            _ => {
                return Err(ConfigError::invalid(
                    "grid",
                    format!("'{name}' is not a numeric strategy parameter"),
                ))
            }
        }
        Ok(())
    }
}

fn count(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(name, "must be >= 1"));
    }
    if value > MAX_COUNT {
        return Err(ConfigError::invalid(
            name,
            format!("must be <= {MAX_COUNT}, got {value}"),
        ));
    }
    Ok(())
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::invalid(
            name,
            format!("must be a positive finite number, got {value}"),
        ));
    }
    Ok(())
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(ConfigError::invalid(
            name,
            format!("must be >= 0, got {value}"),
        ));
    }
    Ok(())
}

fn as_count(name: &'static str, value: f64) -> Result<usize, ConfigError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(ConfigError::invalid(
            name,
            format!("expected a whole number, got {value}"),
        ));
    }
    if value > MAX_COUNT as f64 {
        return Err(ConfigError::invalid(
            name,
            format!("must be <= {MAX_COUNT}, got {value}"),
        ));
    }
    Ok(value as usize)
}
