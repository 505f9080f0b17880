//! PivotLab CLI: run and sweep commands.
//!
//! Commands:
//! - `run`: execute one backtest from a TOML config or a bare CSV path
//! - `sweep`: run a parameter grid over one dataset and rank the results
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `pivotlab=info`).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pivotlab_core::SignalMode;
use pivotlab_runner::export::export_json;
use pivotlab_runner::sweep::export_sweep_csv;
use pivotlab_runner::{
    load_csv, run_single_backtest, save_artifacts, BacktestConfig, BacktestResult, ParamGrid,
    ParamSweep, RankMetric,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pivotlab",
    about = "PivotLab CLI: fractal pivot strategy simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV file to run with default settings (alternative to --config).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Name of the date column in the CSV.
        #[arg(long)]
        date_column: Option<String>,

        #[command(flatten)]
        overrides: Overrides,

        /// Output directory for artifacts. Overrides [output].dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the summary only; write no artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,

        /// Print the full result as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run every point of a parameter grid and rank by a metric.
    Sweep {
        /// Base TOML config (data source and fixed strategy fields).
        #[arg(long)]
        config: PathBuf,

        /// TOML grid: `field = [values...]` per numeric strategy field.
        #[arg(long)]
        grid: PathBuf,

        /// sharpe, cagr, total_return, win_rate, profit_factor, max_drawdown.
        #[arg(long, default_value = "sharpe")]
        metric: String,

        /// Number of rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Run grid points one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write the full ranked table to this CSV file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Strategy fields settable from the command line.
#[derive(clap::Args)]
struct Overrides {
    #[arg(long)]
    left_bars: Option<usize>,
    #[arg(long)]
    right_bars: Option<usize>,
    #[arg(long)]
    ema_period: Option<usize>,
    /// Higher-timeframe rule (W, M, <n>D, <n>H) for the trend EMA and breakout levels.
    #[arg(long)]
    htf: Option<String>,
    #[arg(long)]
    atr_period: Option<usize>,
    #[arg(long)]
    atr_k: Option<f64>,
    #[arg(long)]
    risk: Option<f64>,
    /// Widen initial stops to the opposite swing pivot.
    #[arg(long, default_value_t = false)]
    structure_stop: bool,
    /// Gate entries on proximity to an order-block zone.
    #[arg(long, default_value_t = false)]
    filter_trades: bool,
    /// pivot or breakout.
    #[arg(long)]
    signal_mode: Option<String>,
    /// Any numeric field as name=value; may repeat.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,
}

impl Overrides {
    fn apply(&self, config: &mut BacktestConfig) -> Result<()> {
        let s = &mut config.strategy;
        if let Some(v) = self.left_bars {
            s.left_bars = v;
        }
        if let Some(v) = self.right_bars {
            s.right_bars = v;
        }
        if let Some(v) = self.ema_period {
            s.ema_period = v;
        }
        if let Some(rule) = &self.htf {
            s.use_htf = true;
            s.htf_rule = rule.clone();
        }
        if let Some(v) = self.atr_period {
            s.atr_period = v;
        }
        if let Some(v) = self.atr_k {
            s.atr_k = v;
        }
        if let Some(v) = self.risk {
            s.risk_per_trade = v;
        }
        if self.filter_trades {
            s.filter_trades = true;
        }
        if self.structure_stop {
            s.structure_stop = true;
        }
        if let Some(mode) = &self.signal_mode {
            s.signal_mode = match mode.to_ascii_lowercase().as_str() {
                "pivot" => SignalMode::Pivot,
                "breakout" => SignalMode::Breakout,
                other => bail!("unknown signal mode '{other}' (expected pivot or breakout)"),
            };
        }
        for pair in &self.set {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("--set expects NAME=VALUE, got '{pair}'"))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("--set {name}: '{value}' is not a number"))?;
            s.set_numeric(name.trim(), value)?;
        }
        s.validate()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pivotlab=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            date_column,
            overrides,
            output_dir,
            no_save,
            json,
        } => run_backtest_cmd(
            config,
            data,
            date_column,
            &overrides,
            output_dir,
            no_save,
            json,
        ),
        Commands::Sweep {
            config,
            grid,
            metric,
            top,
            sequential,
            output,
        } => run_sweep_cmd(config, grid, &metric, top, sequential, output),
    }
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    data: Option<PathBuf>,
    date_column: Option<String>,
    overrides: &Overrides,
    output_dir: Option<PathBuf>,
    no_save: bool,
    json: bool,
) -> Result<()> {
    let mut config = match (config_path, data) {
        (Some(_), Some(_)) => bail!("--config and --data are mutually exclusive"),
        (None, None) => bail!("one of --config or --data is required"),
        (Some(path), None) => BacktestConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        (None, Some(path)) => BacktestConfig::for_data(path),
    };
    if let Some(col) = date_column {
        config.data.date_column = col;
    }
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    overrides.apply(&mut config)?;

    let result = run_single_backtest(&config)?;

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print_summary(&result);
    }

    if !no_save {
        let run_dir = save_artifacts(&result, &config.output.dir)?;
        info!(dir = %run_dir.display(), "artifacts saved");
        if !json {
            println!("Artifacts saved to: {}", run_dir.display());
        }
    }
    Ok(())
}

fn run_sweep_cmd(
    config_path: PathBuf,
    grid_path: PathBuf,
    metric: &str,
    top: usize,
    sequential: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let metric: RankMetric = metric.parse()?;
    let config = BacktestConfig::from_file(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let grid = ParamGrid::from_file(&grid_path)?;
    let loaded = load_csv(&config.data.path, &config.data.date_column)?;

    let results = ParamSweep::new(&loaded.series, &loaded.dataset_hash, &loaded.source)
        .with_parallelism(!sequential)
        .sweep(&grid, &config.strategy)?;

    println!();
    println!(
        "=== Sweep: {} runs, {} rejected, ranked by {} ===",
        results.rows.len(),
        results.rejected,
        metric
    );
    println!(
        "{:>4}  {:<40} {:>9} {:>8} {:>9} {:>7} {:>6}",
        "#", "Params", "Return", "Sharpe", "MaxDD", "WinR", "Trades"
    );
    println!("{}", "-".repeat(92));
    for (rank, row) in results.top(metric, top).iter().enumerate() {
        let params = row
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        let m = &row.metrics;
        println!(
            "{:>4}  {:<40} {:>8.2}% {:>8.3} {:>8.2}% {:>6.1}% {:>6}",
            rank + 1,
            params,
            m.total_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            m.win_rate * 100.0,
            m.trade_count
        );
    }
    println!();

    if let Some(path) = output {
        let csv = export_sweep_csv(&results, metric)?;
        std::fs::write(&path, csv)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep table saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Source:         {}", result.source);
    println!("Period:         {} to {}", result.start, result.end);
    println!("Bars:           {}", result.bar_count);
    println!("Run ID:         {}", &result.run_id[..16.min(result.run_id.len())]);
    println!("Pivots:         {}", result.pivot_count);
    if result.htf_pivot_count > 0 {
        println!("HTF Pivots:     {}", result.htf_pivot_count);
    }
    println!("Zones:          {}", result.zones.len());
    println!("Signals:        {}", result.signal_count);
    println!("Skipped:        {}", result.skipped.len());
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Start Equity:   {:.2}", m.start_equity);
    println!("End Equity:     {:.2}", m.end_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Avg R:          {:.2}", m.avg_r);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!();
}
