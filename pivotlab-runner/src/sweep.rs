//! Parameter sweep over a grid of numeric strategy fields.
//!
//! A grid maps field names to candidate values:
//!
//! ```toml
//! ema_period = [20, 50, 100]
//! atr_k = [1.5, 2.0, 3.0]
//! ```
//!
//! The sweep takes the cartesian product over a base [`StrategyConfig`],
//! drops combinations that fail validation, and runs the rest on a rayon
//! pool. Each run owns its engine, so nothing is shared between workers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use pivotlab_core::config::NUMERIC_FIELDS;
use pivotlab_core::domain::PriceSeries;
use pivotlab_core::{PerformanceMetrics, StrategyConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RunId;
use crate::runner::run_on_series;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("unknown grid parameter '{0}'")]
    UnknownParameter(String),

    #[error("grid parameter '{0}' has no values")]
    EmptyAxis(String),

    #[error("failed to parse grid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown ranking metric '{0}'")]
    UnknownMetric(String),
}

// ─── Grid ───────────────────────────────────────────────────────────

/// Candidate values per numeric strategy field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    pub axes: BTreeMap<String, Vec<f64>>,
}

/// One point of the grid.
pub type ParamSet = BTreeMap<String, f64>;

impl ParamGrid {
    pub fn from_toml(text: &str) -> Result<Self, SweepError> {
        let grid: Self = toml::from_str(text)?;
        grid.check()?;
        Ok(grid)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read grid file {}", path.display()))?;
        Ok(Self::from_toml(&text)?)
    }

    pub fn with_axis(mut self, name: &str, values: Vec<f64>) -> Self {
        self.axes.insert(name.to_string(), values);
        self
    }

    /// Every axis names a numeric field and has at least one value.
    pub fn check(&self) -> Result<(), SweepError> {
        for (name, values) in &self.axes {
            if !NUMERIC_FIELDS.contains(&name.as_str()) {
                return Err(SweepError::UnknownParameter(name.clone()));
            }
            if values.is_empty() {
                return Err(SweepError::EmptyAxis(name.clone()));
            }
        }
        Ok(())
    }

    /// Number of points in the cartesian product.
    pub fn size(&self) -> usize {
        self.axes.values().map(Vec::len).product()
    }

    /// All points, in lexicographic order of axis name then value position.
    pub fn points(&self) -> Vec<ParamSet> {
        let mut points = vec![ParamSet::new()];
        for (name, values) in &self.axes {
            points = points
                .into_iter()
                .flat_map(|point| {
                    values.iter().map(move |&v| {
                        let mut next = point.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        points
    }

    /// Apply every point to `base`, keeping only valid configurations.
    ///
    /// Returns the valid `(point, config)` pairs and the number rejected.
    pub fn generate_configs(&self, base: &StrategyConfig) -> (Vec<(ParamSet, StrategyConfig)>, usize) {
        let mut configs = Vec::new();
        let mut rejected = 0;
        for point in self.points() {
            let mut config = base.clone();
            let applied = point
                .iter()
                .try_for_each(|(name, &value)| config.set_numeric(name, value))
                .and_then(|_| config.validate());
            match applied {
                Ok(()) => configs.push((point, config)),
                Err(err) => {
                    debug!(?point, %err, "skipping invalid grid point");
                    rejected += 1;
                }
            }
        }
        (configs, rejected)
    }
}

// ─── Ranking ────────────────────────────────────────────────────────

/// Metric used to order sweep results. Larger is always better;
/// `MaxDrawdown` is negative, so larger means shallower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    #[default]
    Sharpe,
    Cagr,
    TotalReturn,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
}

impl RankMetric {
    pub fn value(self, m: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => m.sharpe,
            Self::Cagr => m.cagr,
            Self::TotalReturn => m.total_return,
            Self::WinRate => m.win_rate,
            Self::ProfitFactor => m.profit_factor,
            Self::MaxDrawdown => m.max_drawdown,
        }
    }
}

impl FromStr for RankMetric {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sharpe" => Ok(Self::Sharpe),
            "cagr" => Ok(Self::Cagr),
            "total_return" => Ok(Self::TotalReturn),
            "win_rate" => Ok(Self::WinRate),
            "profit_factor" => Ok(Self::ProfitFactor),
            "max_drawdown" => Ok(Self::MaxDrawdown),
            _ => Err(SweepError::UnknownMetric(s.to_string())),
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sharpe => "sharpe",
            Self::Cagr => "cagr",
            Self::TotalReturn => "total_return",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::MaxDrawdown => "max_drawdown",
        };
        f.write_str(name)
    }
}

// ─── Execution ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub run_id: RunId,
    pub params: ParamSet,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    pub rows: Vec<SweepRow>,
    /// Grid points rejected by validation.
    pub rejected: usize,
}

impl SweepResults {
    /// Rows ordered best-first by `metric`. Ties keep grid order.
    pub fn ranked(&self, metric: RankMetric) -> Vec<&SweepRow> {
        let mut rows: Vec<&SweepRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            metric
                .value(&b.metrics)
                .total_cmp(&metric.value(&a.metrics))
        });
        rows
    }

    pub fn top(&self, metric: RankMetric, n: usize) -> Vec<&SweepRow> {
        let mut rows = self.ranked(metric);
        rows.truncate(n);
        rows
    }
}

/// Runs a grid against one price series.
pub struct ParamSweep<'a> {
    series: &'a PriceSeries,
    dataset_hash: &'a str,
    source: &'a str,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(series: &'a PriceSeries, dataset_hash: &'a str, source: &'a str) -> Self {
        Self {
            series,
            dataset_hash,
            source,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep(&self, grid: &ParamGrid, base: &StrategyConfig) -> Result<SweepResults, SweepError> {
        grid.check()?;
        let (configs, rejected) = grid.generate_configs(base);
        if rejected > 0 {
            warn!(rejected, total = grid.size(), "grid points failed validation");
        }
        info!(runs = configs.len(), parallel = self.parallel, "starting sweep");

        let run = |(params, config): &(ParamSet, StrategyConfig)| {
            run_on_series(config, self.series, self.dataset_hash, self.source)
                .ok()
                .map(|result| SweepRow {
                    run_id: result.run_id,
                    params: params.clone(),
                    metrics: result.metrics,
                })
        };

        // Configs are pre-validated, so a failed run can only be an engine
        // rejection; such points are counted with the rejected ones.
        let outcomes: Vec<Option<SweepRow>> = if self.parallel {
            configs.par_iter().map(run).collect()
        } else {
            configs.iter().map(run).collect()
        };
        let failed = outcomes.iter().filter(|o| o.is_none()).count();
        let rows: Vec<SweepRow> = outcomes.into_iter().flatten().collect();

        info!(completed = rows.len(), "sweep complete");
        Ok(SweepResults {
            rows,
            rejected: rejected + failed,
        })
    }
}

/// Ranked sweep table as CSV: rank, run id, one column per axis, metrics.
pub fn export_sweep_csv(results: &SweepResults, metric: RankMetric) -> Result<String> {
    let axes: Vec<String> = results
        .rows
        .first()
        .map(|r| r.params.keys().cloned().collect())
        .unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["rank".to_string(), "run_id".to_string()];
    header.extend(axes.iter().cloned());
    header.extend(
        [
            "total_return",
            "cagr",
            "sharpe",
            "max_drawdown",
            "win_rate",
            "profit_factor",
            "trades",
        ]
        .map(String::from),
    );
    wtr.write_record(&header)?;

    for (rank, row) in results.ranked(metric).into_iter().enumerate() {
        let m = &row.metrics;
        let mut record = vec![(rank + 1).to_string(), row.run_id.clone()];
        record.extend(axes.iter().map(|a| {
            row.params
                .get(a)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        record.extend([
            format!("{:.6}", m.total_return),
            format!("{:.6}", m.cagr),
            format!("{:.4}", m.sharpe),
            format!("{:.6}", m.max_drawdown),
            format!("{:.4}", m.win_rate),
            format!("{:.4}", m.profit_factor),
            m.trade_count.to_string(),
        ]);
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_parses_integer_and_float_axes() {
        let grid = ParamGrid::from_toml("ema_period = [10, 20]\natr_k = [1.5, 2.0, 3.0]\n").unwrap();
        assert_eq!(grid.size(), 6);
        assert_eq!(grid.axes["ema_period"], vec![10.0, 20.0]);
    }

    #[test]
    fn unknown_or_empty_axis_is_an_error() {
        assert!(matches!(
            ParamGrid::from_toml("bogus = [1]\n"),
            Err(SweepError::UnknownParameter(_))
        ));
        assert!(matches!(
            ParamGrid::from_toml("ema_period = []\n"),
            Err(SweepError::EmptyAxis(_))
        ));
    }

    #[test]
    fn points_are_the_cartesian_product() {
        let grid = ParamGrid::default()
            .with_axis("left_bars", vec![1.0, 2.0])
            .with_axis("right_bars", vec![3.0, 4.0]);
        let points = grid.points();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0]["left_bars"], 1.0);
        assert_eq!(points[0]["right_bars"], 3.0);
        assert_eq!(points[3]["left_bars"], 2.0);
        assert_eq!(points[3]["right_bars"], 4.0);
    }

    #[test]
    fn empty_grid_is_a_single_base_run() {
        let grid = ParamGrid::default();
        assert_eq!(grid.size(), 1);
        let (configs, rejected) = grid.generate_configs(&StrategyConfig::default());
        assert_eq!(configs.len(), 1);
        assert_eq!(rejected, 0);
    }

    #[test]
    fn invalid_points_are_counted_not_run() {
        let grid = ParamGrid::default()
            .with_axis("ema_period", vec![0.0, 10.0, 2.5])
            .with_axis("risk_per_trade", vec![0.01, 2.0]);
        let (configs, rejected) = grid.generate_configs(&StrategyConfig::default());
        assert_eq!(configs.len(), 1);
        assert_eq!(rejected, 5);
        assert_eq!(configs[0].1.ema_period, 10);
    }

    #[test]
    fn metric_names_parse() {
        assert_eq!("Sharpe".parse::<RankMetric>().unwrap(), RankMetric::Sharpe);
        assert_eq!(
            "max_drawdown".parse::<RankMetric>().unwrap(),
            RankMetric::MaxDrawdown
        );
        assert!("sortino".parse::<RankMetric>().is_err());
        assert_eq!(RankMetric::ProfitFactor.to_string(), "profit_factor");
    }
}
