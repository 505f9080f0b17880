//! TOML backtest configuration.
//!
//! ```toml
//! [data]
//! path = "data/spy.csv"
//! date_column = "Date"
//!
//! [strategy]
//! ema_period = 50
//! filter_trades = true
//!
//! [output]
//! dir = "results"
//! ```
//!
//! Every table is optional except `[data]`. Missing strategy fields take
//! their defaults.

use std::path::{Path, PathBuf};

use pivotlab_core::StrategyConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content-addressed identifier of a run (hex BLAKE3).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid strategy: {0}")]
    Strategy(#[from] pivotlab_core::ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    pub path: PathBuf,
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

/// Complete description of one backtest: where the bars are, how to trade
/// them, and where artifacts go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub data: DataSection,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub output: OutputSection,
}

impl BacktestConfig {
    /// Config for a CSV path with default strategy and output settings.
    pub fn for_data(path: impl Into<PathBuf>) -> Self {
        Self {
            data: DataSection {
                path: path.into(),
                date_column: default_date_column(),
            },
            strategy: StrategyConfig::default(),
            output: OutputSection::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.strategy.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file. A relative `data.path` is
    /// resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        if config.data.path.is_relative() {
            if let Some(parent) = path.parent() {
                config.data.path = parent.join(&config.data.path);
            }
        }
        Ok(config)
    }

    /// Deterministic id over the strategy and the dataset it runs on.
    ///
    /// Data path and output directory are excluded, so moving a file does
    /// not change the id while editing its contents does.
    pub fn run_id(&self, dataset_hash: &str) -> RunId {
        strategy_run_id(&self.strategy, dataset_hash)
    }
}

/// BLAKE3 of the canonical JSON of a strategy plus the dataset hash.
pub fn strategy_run_id(strategy: &StrategyConfig, dataset_hash: &str) -> RunId {
    let mut hasher = blake3::Hasher::new();
    // StrategyConfig holds only plain fields; serialization cannot fail.
    let json = serde_json::to_string(strategy).unwrap_or_default();
    hasher.update(json.as_bytes());
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pivotlab_core::SignalMode;

    const FULL: &str = r#"
[data]
path = "bars.csv"
date_column = "timestamp"

[strategy]
ema_period = 21
signal_mode = "breakout"
filter_trades = true
atr_trail_k = 3.0

[output]
dir = "out"
"#;

    #[test]
    fn parses_all_sections() {
        let config = BacktestConfig::from_toml(FULL).unwrap();
        assert_eq!(config.data.path, PathBuf::from("bars.csv"));
        assert_eq!(config.data.date_column, "timestamp");
        assert_eq!(config.strategy.ema_period, 21);
        assert_eq!(config.strategy.signal_mode, SignalMode::Breakout);
        assert!(config.strategy.filter_trades);
        assert_eq!(config.strategy.atr_trail_k, Some(3.0));
        assert_eq!(config.strategy.left_bars, 2);
        assert_eq!(config.output.dir, PathBuf::from("out"));
    }

    #[test]
    fn only_data_is_required() {
        let config = BacktestConfig::from_toml("[data]\npath = \"x.csv\"\n").unwrap();
        assert_eq!(config.data.date_column, "Date");
        assert_eq!(config.strategy, StrategyConfig::default());
        assert_eq!(config.output.dir, PathBuf::from("results"));

        assert!(matches!(
            BacktestConfig::from_toml("[strategy]\nema_period = 3\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_strategy_is_rejected() {
        let text = "[data]\npath = \"x.csv\"\n[strategy]\nrisk_per_trade = 1.5\n";
        assert!(matches!(
            BacktestConfig::from_toml(text),
            Err(ConfigError::Strategy(_))
        ));
    }

    #[test]
    fn run_id_is_deterministic_and_content_addressed() {
        let a = BacktestConfig::from_toml(FULL).unwrap();
        let mut moved = a.clone();
        moved.data.path = PathBuf::from("elsewhere/bars.csv");
        moved.output.dir = PathBuf::from("other");

        assert_eq!(a.run_id("abc"), a.run_id("abc"));
        assert_eq!(a.run_id("abc"), moved.run_id("abc"));
        assert_ne!(a.run_id("abc"), a.run_id("abd"));

        let mut tweaked = a.clone();
        tweaked.strategy.ema_period = 22;
        assert_ne!(a.run_id("abc"), tweaked.run_id("abc"));
    }
}
