//! CSV bar loading.
//!
//! Reads `Date,Open,High,Low,Close[,Volume]` tables into a validated
//! [`PriceSeries`]. Header names are matched case-insensitively and the date
//! column name is configurable. Rows are never re-sorted: an unordered or
//! duplicated timestamp is reported as an [`InputError`].

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use pivotlab_core::domain::{Bar, PriceSeries};
use pivotlab_core::error::InputError;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: cannot parse date '{value}'")]
    BadDate { row: usize, value: String },

    #[error("row {row}: cannot parse {column} value '{value}'")]
    BadNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("invalid price data: {0}")]
    Input(#[from] InputError),
}

/// A loaded series plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: PriceSeries,
    /// BLAKE3 over every bar field, hex encoded.
    pub dataset_hash: String,
    pub source: String,
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Load a CSV file from disk.
pub fn load_csv(path: &Path, date_column: &str) -> Result<LoadedData, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let series = read_series(file, date_column)?;
    let dataset_hash = dataset_hash(series.bars());
    info!(
        path = %path.display(),
        bars = series.len(),
        first = %series.first().timestamp,
        last = %series.last().timestamp,
        "loaded price series"
    );
    Ok(LoadedData {
        series,
        dataset_hash,
        source: path.display().to_string(),
    })
}

/// Parse bars from any CSV reader.
pub fn read_series<R: Read>(reader: R, date_column: &str) -> Result<PriceSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    };
    let date_col = find(date_column)?;
    let open_col = find("open")?;
    let high_col = find("high")?;
    let low_col = find("low")?;
    let close_col = find("close")?;
    let volume_col = find("volume").ok();
    if volume_col.is_none() {
        debug!("no volume column; bars carry no volume");
    }

    let mut bars = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");

        let timestamp = parse_timestamp(field(date_col)).ok_or_else(|| LoadError::BadDate {
            row,
            value: field(date_col).to_string(),
        })?;
        let number = |i: usize, column: &'static str| {
            field(i).parse::<f64>().map_err(|_| LoadError::BadNumber {
                row,
                column,
                value: field(i).to_string(),
            })
        };

        let mut bar = Bar::new(
            timestamp,
            number(open_col, "open")?,
            number(high_col, "high")?,
            number(low_col, "low")?,
            number(close_col, "close")?,
        );
        if let Some(i) = volume_col {
            if !field(i).is_empty() {
                bar = bar.with_volume(number(i, "volume")?);
            }
        }
        bars.push(bar);
    }

    Ok(PriceSeries::new(bars)?)
}

/// Parse a timestamp in any of the accepted layouts. Dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.naive_local())
}

/// Content hash of a bar slice, stable across runs and platforms.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&v.to_le_bytes());
        }
        match bar.volume {
            Some(v) => hasher.update(&v.to_le_bytes()),
            None => hasher.update(&[0xff]),
        };
    }
    hasher.finalize().to_hex().to_string()
}
