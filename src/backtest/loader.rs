//! CSV bar loader for backtests

use std::collections::BTreeMap;
use std::path::Path;

use chrono::DateTime;
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::Bar;

#[derive(Debug, Deserialize)]
struct BarRow {
    symbol: String,
    /// Epoch milliseconds
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Read `symbol,timestamp,open,high,low,close,volume` rows grouped by symbol.
/// Row order within a symbol is kept as-is.
pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<BTreeMap<String, Vec<Bar>>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut data: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
    let mut rows = 0usize;
    for record in reader.deserialize() {
        let row: BarRow = record?;
        let timestamp = DateTime::from_timestamp_millis(row.timestamp).ok_or_else(|| {
            Error::Decode(format!("timestamp out of range: {}", row.timestamp))
        })?;
        data.entry(row.symbol.clone()).or_default().push(Bar {
            symbol: row.symbol,
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
        rows += 1;
    }

    info!(
        "Loaded {} bars for {} symbols from {}",
        rows,
        data.len(),
        path.display()
    );
    Ok(data)
}
