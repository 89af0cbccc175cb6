use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use csv::Writer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analysis::{AlignedPoint, CorrelationMethod};
use crate::errors::StorageError;
use crate::models::{PricePoint, TransferKind, ValuedTransfer, WhaleTransactionSet};

pub const WHALE_TRANSACTIONS_FILE: &str = "whale_transactions.csv";
pub const PROCESSED_PRICE_FILE: &str = "price_data.csv";
pub const PROCESSED_WHALE_FILE: &str = "whale_data.csv";
pub const MERGED_FILE: &str = "merged_price_whale.csv";
pub const CORRELATION_FILE: &str = "correlation.txt";
pub const METRICS_FILE: &str = "metrics.prom";

/// One row of the whale transactions CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleTransactionRow {
    pub wallet: String,
    #[serde(rename = "type")]
    pub kind: TransferKind,
    pub amount: Decimal,
    pub usd_value: Decimal,
    pub from: String,
    pub to: String,
    pub timestamp: String,
    pub date: NaiveDate,
    pub signature: String,
    pub token_address: String,
    pub token_symbol: String,
}

impl From<&ValuedTransfer> for WhaleTransactionRow {
    fn from(t: &ValuedTransfer) -> Self {
        Self {
            wallet: t.wallet.clone(),
            kind: t.kind,
            amount: t.amount,
            usd_value: t.usd_value,
            from: t.from.clone(),
            to: t.to.clone(),
            timestamp: t.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            date: t.date,
            signature: t.signature.clone(),
            token_address: t.asset_id.clone(),
            token_symbol: t.asset_symbol.clone().unwrap_or_default(),
        }
    }
}

impl WhaleTransactionRow {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[derive(Serialize)]
struct PriceRow {
    date: NaiveDate,
    price: Decimal,
}

#[derive(Serialize)]
struct VolumeRow {
    date: NaiveDate,
    usd_value: Decimal,
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|source| StorageError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, StorageError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = Writer::from_path(path).map_err(csv_err)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
        count += 1;
    }
    writer.flush().map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), rows = count, "CSV written");
    Ok(count)
}

fn write_text(path: &Path, contents: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(io_err)?;
    file.write_all(contents.as_bytes()).map_err(io_err)?;
    Ok(())
}

/// `{dir}/{coin}_price_data.csv` with one `date,price` row per day.
pub fn write_price_history(
    dir: &Path,
    coin_id: &str,
    points: impl IntoIterator<Item = PricePoint>,
) -> Result<PathBuf, StorageError> {
    let path = dir.join(format!("{coin_id}_price_data.csv"));
    write_rows(
        &path,
        points.into_iter().map(|p| PriceRow {
            date: p.date,
            price: p.price,
        }),
    )?;
    Ok(path)
}

/// Whale transfers in set order (USD value descending).
pub fn write_whale_transactions(
    dir: &Path,
    whales: &WhaleTransactionSet,
) -> Result<PathBuf, StorageError> {
    let path = dir.join(WHALE_TRANSACTIONS_FILE);
    if whales.is_empty() {
        // headers only; serialize writes them lazily
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let csv_err = |source| StorageError::Csv {
            path: path.clone(),
            source,
        };
        let mut writer = Writer::from_path(&path).map_err(csv_err)?;
        writer
            .write_record(WHALE_TRANSACTION_HEADERS)
            .map_err(csv_err)?;
        writer.flush().map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::warn!(path = %path.display(), "No whale transfers to write");
        return Ok(path);
    }

    write_rows(&path, whales.iter().map(WhaleTransactionRow::from))?;
    Ok(path)
}

pub const WHALE_TRANSACTION_HEADERS: [&str; 11] = [
    "wallet",
    "type",
    "amount",
    "usd_value",
    "from",
    "to",
    "timestamp",
    "date",
    "signature",
    "token_address",
    "token_symbol",
];

pub fn read_whale_transactions(path: &Path) -> Result<Vec<WhaleTransactionRow>, StorageError> {
    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    reader
        .deserialize()
        .collect::<Result<Vec<WhaleTransactionRow>, _>>()
        .map_err(csv_err)
}

/// Paths of the aligned series outputs.
#[derive(Debug, Clone)]
pub struct AlignedOutputs {
    pub price: PathBuf,
    pub whale: PathBuf,
    pub merged: PathBuf,
}

/// Aligned price and whale series to `processed_dir`, the merged table to
/// `results_dir`.
pub fn write_aligned_series(
    processed_dir: &Path,
    results_dir: &Path,
    points: &[AlignedPoint],
) -> Result<AlignedOutputs, StorageError> {
    let outputs = AlignedOutputs {
        price: processed_dir.join(PROCESSED_PRICE_FILE),
        whale: processed_dir.join(PROCESSED_WHALE_FILE),
        merged: results_dir.join(MERGED_FILE),
    };

    write_rows(
        &outputs.price,
        points.iter().map(|p| PriceRow {
            date: p.date,
            price: p.price,
        }),
    )?;
    write_rows(
        &outputs.whale,
        points.iter().map(|p| VolumeRow {
            date: p.date,
            usd_value: p.usd_value,
        }),
    )?;
    write_rows(&outputs.merged, points.iter())?;

    Ok(outputs)
}

pub fn correlation_line(method: CorrelationMethod, r: f64) -> String {
    format!(
        "{} correlation between price and whale volume: {r:.4}",
        method.title()
    )
}

pub fn write_correlation_report(
    results_dir: &Path,
    method: CorrelationMethod,
    r: f64,
) -> Result<PathBuf, StorageError> {
    let path = results_dir.join(CORRELATION_FILE);
    write_text(&path, &format!("{}\n", correlation_line(method, r)))?;
    tracing::info!(path = %path.display(), "Correlation report written");
    Ok(path)
}

/// Prometheus text snapshot of the run's metrics.
pub fn write_metrics_snapshot(results_dir: &Path, rendered: &str) -> Result<PathBuf, StorageError> {
    let path = results_dir.join(METRICS_FILE);
    write_text(&path, rendered)?;
    Ok(path)
}
