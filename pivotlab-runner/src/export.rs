//! Artifact export: JSON summary plus CSV tables.
//!
//! A run directory holds:
//! - `summary.json`: the full `BacktestResult`, schema versioned
//! - `trades.csv`: the trade ledger
//! - `equity.csv`: realized equity per bar
//! - `zones.csv`: detected order-block zones
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pivotlab_core::domain::{OrderBlockZone, Trade};
use pivotlab_core::engine::EquityPoint;
use tracing::debug;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting schema versions newer than ours.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_index",
        "entry_time",
        "entry_price",
        "exit_index",
        "exit_time",
        "exit_price",
        "exit_reason",
        "size",
        "initial_stop",
        "risk_amount",
        "gross_pnl",
        "commission",
        "slippage",
        "net_pnl",
        "r_multiple",
        "return_pct",
        "bars_held",
        "pivot_index",
    ])?;

    for t in trades {
        wtr.write_record([
            format!("{:?}", t.side),
            t.entry_index.to_string(),
            t.entry_timestamp.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_index.to_string(),
            t.exit_timestamp.to_string(),
            format!("{:.6}", t.exit_price),
            format!("{:?}", t.exit_reason),
            format!("{:.0}", t.size),
            format!("{:.6}", t.initial_stop),
            format!("{:.2}", t.risk_amount),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.slippage),
            format!("{:.2}", t.net_pnl),
            format!("{:.4}", t.r_multiple),
            format!("{:.6}", t.return_pct()),
            t.bars_held.to_string(),
            t.signal_pivot
                .map(|p| p.index.to_string())
                .unwrap_or_default(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "timestamp", "equity"])?;
    for p in equity_curve {
        wtr.write_record([
            p.index.to_string(),
            p.timestamp.to_string(),
            format!("{:.2}", p.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_zones_csv(zones: &[OrderBlockZone]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "direction",
        "start_index",
        "end_index",
        "formation_index",
        "price_low",
        "price_high",
        "pivot_index",
        "pivot_kind",
    ])?;
    for z in zones {
        wtr.write_record([
            format!("{:?}", z.direction),
            z.start_index.to_string(),
            z.end_index.to_string(),
            z.formation_index.to_string(),
            format!("{:.6}", z.price_low),
            format!("{:.6}", z.price_high),
            z.origin_pivot.index.to_string(),
            format!("{:?}", z.origin_pivot.kind),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set under `output_dir/<run id prefix>/`.
///
/// The directory name is derived from the run id, so re-running the same
/// strategy on the same data overwrites the same directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix_len = result.run_id.len().min(16);
    let run_dir = output_dir.join(&result.run_id[..prefix_len]);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("summary.json", export_json(result)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
        ("equity.csv", export_equity_csv(&result.equity_curve)?),
        ("zones.csv", export_zones_csv(&result.zones)?),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), "wrote artifact");
    }

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's summary.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let summary_path = dir.join("summary.json");
    let json = std::fs::read_to_string(&summary_path)
        .with_context(|| format!("failed to read {}", summary_path.display()))?;
    import_json(&json)
}
