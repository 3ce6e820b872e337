//! Writes backtest reports to disk as JSON or CSV

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use chrono::SecondsFormat;
use tracing::info;

use super::BacktestReport;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    /// Infer from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(Error::Export(format!("unsupported format {}", other))),
        }
    }
}

const CSV_HEADER: [&str; 6] = [
    "symbol",
    "direction",
    "entry_time",
    "expiry_time",
    "outcome",
    "reason",
];

/// Write `report` to `path`. With no explicit format the extension decides.
pub fn export_report(
    report: &BacktestReport,
    path: impl AsRef<Path>,
    format: Option<ReportFormat>,
) -> Result<()> {
    let path = path.as_ref();
    if report.results.is_empty() {
        return Err(Error::Export("empty results".to_string()));
    }

    let format = match format {
        Some(format) => format,
        None => ReportFormat::from_path(path).ok_or_else(|| {
            Error::Export(format!("unknown format for {}", path.display()))
        })?,
    };

    match format {
        ReportFormat::Json => write_json(report, path)?,
        ReportFormat::Csv => write_csv(report, path)?,
    }

    info!(
        "Exported {} backtest results to {}",
        report.results.len(),
        path.display()
    );
    Ok(())
}

fn write_json(report: &BacktestReport, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn write_csv(report: &BacktestReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;
    for r in &report.results {
        writer.write_record([
            r.symbol.clone(),
            r.direction.to_string(),
            r.entry_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            r.expiry_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            r.outcome.to_string(),
            r.reason.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
