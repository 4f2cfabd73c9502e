//! CSV series files for collected and stitched bars.

use crate::domain::bar::{Bar, ContractFrames, ContractSeries, StitchedSeries};
use crate::domain::error::RollstitchError;
use crate::domain::inventory::{summarize_contracts, ContractSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<&Bar> for CsvRow {
    fn from(bar: &Bar) -> Self {
        Self {
            timestamp: bar.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

pub struct CsvSeriesWriter {
    output_dir: PathBuf,
}

impl CsvSeriesWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn candles_path(&self, timeframe: &str) -> PathBuf {
        self.output_dir.join(format!("{timeframe}.csv"))
    }

    pub fn chain_path(&self, timeframe: &str) -> PathBuf {
        self.output_dir.join(format!("{timeframe}_chain.csv"))
    }

    pub fn contract_path(&self, contract_id: &str, timeframe: &str) -> PathBuf {
        self.output_dir
            .join("contracts")
            .join(contract_id)
            .join(format!("{timeframe}.csv"))
    }

    /// Front-contract candles, one file per timeframe.
    pub fn write_candles(&self, candles: &ContractSeries) -> Result<(), RollstitchError> {
        for (tf, bars) in candles {
            write_bars(&self.candles_path(tf), bars)?;
        }
        Ok(())
    }

    /// Stitched series plus every per-contract series behind them.
    pub fn write_stitched(
        &self,
        stitched: &StitchedSeries,
        frames: &ContractFrames,
    ) -> Result<ContractSummary, RollstitchError> {
        for (tf, bars) in stitched {
            write_bars(&self.chain_path(tf), bars)?;
        }

        for (contract_id, series) in frames {
            for (tf, bars) in series {
                write_bars(&self.contract_path(contract_id, tf), bars)?;
            }
        }
        Ok(summarize_contracts(frames))
    }
}

pub fn write_bars(path: &Path, bars: &[Bar]) -> Result<(), RollstitchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    if bars.is_empty() {
        wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])
            .map_err(|e| csv_error(path, e))?;
    }
    for bar in bars {
        wtr.serialize(CsvRow::from(bar))
            .map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    debug!(path = %path.display(), rows = bars.len(), "wrote series file");
    Ok(())
}

pub fn read_bars(path: &Path) -> Result<Vec<Bar>, RollstitchError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let mut bars = Vec::new();
    for result in rdr.deserialize::<CsvRow>() {
        let row = result.map_err(|e| csv_error(path, e))?;
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| RollstitchError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid timestamp '{}' in {}: {}", row.timestamp, path.display(), e),
            )))?
            .with_timezone(&Utc);
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

fn csv_error(path: &Path, err: csv::Error) -> RollstitchError {
    RollstitchError::Io(std::io::Error::other(format!(
        "CSV error in {}: {}",
        path.display(),
        err
    )))
}
