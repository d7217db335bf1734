//! Persisted pipeline outputs.
//!
//! File naming is deterministic: cleaned tables carry the normalized
//! country display name and the run date; forecast files and model
//! artifacts carry the country key. Consumers locate the most recent
//! cleaned table by file modification time. Writes are plain synchronous
//! CSV; a crash mid-write can leave a partial file.

use crate::error::{PipelineError, Result};
use crate::models::{AggregateForecast, RegionalForecast};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File-friendly form of a country display name
pub fn normalize_country_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Run-dated path for a country's cleaned table
pub fn cleaned_data_path(dir: &Path, display_name: &str, run_date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "cleaned_sales_{}_{}.csv",
        normalize_country_name(display_name),
        run_date.format("%Y-%m-%d")
    ))
}

/// The most recently modified cleaned table for a country
pub fn latest_cleaned_file(dir: &Path, display_name: &str) -> Result<PathBuf> {
    let prefix = format!("cleaned_sales_{}_", normalize_country_name(display_name));

    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !file_name.starts_with(&prefix) || !file_name.ends_with(".csv") {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if latest.as_ref().map_or(true, |(best, _)| modified > *best) {
                latest = Some((modified, path));
            }
        }
    }

    latest.map(|(_, path)| path).ok_or_else(|| {
        PipelineError::MissingFile(format!(
            "no cleaned data file for '{display_name}' under {}",
            dir.display()
        ))
    })
}

/// Path of a country's national forecast file
pub fn national_forecast_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("national_forecast_{key}.csv"))
}

/// Path of a country's regional forecast file
pub fn regional_forecast_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("regional_forecast_{key}.csv"))
}

/// Write a DataFrame as CSV, creating parent directories as needed
pub fn write_dataframe(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
    Ok(())
}

/// Read a CSV file into a DataFrame
pub fn read_dataframe(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::MissingFile(format!(
            "expected file not found at {}",
            path.display()
        )));
    }
    let file = File::open(path)?;
    Ok(CsvReader::new(file)
        .infer_schema(None)
        .has_header(true)
        .finish()?)
}

/// Persist a national forecast
pub fn write_aggregate_forecast(forecast: &AggregateForecast, path: &Path) -> Result<()> {
    write_dataframe(&forecast.to_dataframe()?, path)
}

/// Load a previously persisted national forecast
pub fn read_aggregate_forecast(path: &Path) -> Result<AggregateForecast> {
    AggregateForecast::from_dataframe(&read_dataframe(path)?)
}

/// Persist a regional forecast
pub fn write_regional_forecast(forecast: &RegionalForecast, path: &Path) -> Result<()> {
    write_dataframe(&forecast.to_dataframe()?, path)
}
