//! Tabular sales data handling.
//!
//! [`SalesTable`] wraps a polars `DataFrame` holding one row per weekly
//! date and one value column per region (plus an optional national total).
//! Dates are stored with polars' `Date` dtype (days since epoch) and
//! converted to `chrono::NaiveDate` at the edges.

use crate::error::{PipelineError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Canonical name of the date column after cleaning
pub const DATE_COLUMN: &str = "date";

/// Canonical name of the national total column after cleaning
pub const NATIONAL_COLUMN: &str = "national";

/// Date formats accepted in raw input
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// A weekly sales table for one country
#[derive(Debug, Clone)]
pub struct SalesTable {
    df: DataFrame,
}

impl SalesTable {
    /// Wrap an existing DataFrame
    pub fn from_dataframe(df: DataFrame) -> Self {
        Self { df }
    }

    /// Load a sales table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingFile(format!(
                "sales data file not found at {}",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Ok(Self { df })
    }

    /// Write the table to a CSV file, creating parent directories as needed
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        let mut df = self.df.clone();
        CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
        Ok(())
    }

    /// Get the underlying DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Consume the wrapper and return the DataFrame
    pub fn into_dataframe(self) -> DataFrame {
        self.df
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Check whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// The dates of the table, in row order
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let column = detect_date_column(&self.df)?;
        series_dates(self.df.column(&column)?)
    }

    /// Names of the region value columns, in schema order
    pub fn region_columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .filter(|name| is_region_column(name))
            .map(|name| name.to_string())
            .collect()
    }

    /// A value column as `Option<f64>` per row
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.df.column(name).map_err(|_| {
            PipelineError::DataFormat(format!("required column '{name}' not found"))
        })?;
        series_values(series)
    }

    /// A value column that must be fully populated
    pub fn column_dense(&self, name: &str) -> Result<Vec<f64>> {
        self.column_values(name)?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    PipelineError::DataFormat(format!(
                        "column '{name}' contains missing values"
                    ))
                })
            })
            .collect()
    }

    /// Fail if any column still contains missing values.
    ///
    /// Backward fill leaves trailing gaps unresolved when the most recent
    /// observations are missing; model fitting refuses such tables.
    pub fn validate_dense(&self) -> Result<()> {
        for series in self.df.get_columns() {
            let nulls = series.null_count();
            if nulls > 0 {
                return Err(PipelineError::DataFormat(format!(
                    "column '{}' has {} missing value(s) after cleaning; \
                     trailing gaps cannot be backward-filled",
                    series.name(),
                    nulls
                )));
            }
        }
        Ok(())
    }
}

/// Whether a column name follows the region naming convention
pub fn is_region_column(name: &str) -> bool {
    name.to_lowercase().replace(' ', "_").starts_with("region")
}

/// Whether a column name is the national total column
pub fn is_national_column(name: &str) -> bool {
    name.to_lowercase().trim() == NATIONAL_COLUMN
}

/// Find the date column of a raw or cleaned table
pub fn detect_date_column(df: &DataFrame) -> Result<String> {
    for name in df.get_column_names() {
        if name.to_lowercase() == DATE_COLUMN {
            return Ok(name.to_string());
        }
    }

    Err(PipelineError::DataFormat(
        "no date column found in data".to_string(),
    ))
}

/// Parse a raw date cell
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    // Timestamps like "2024-01-01 00:00:00" keep their date part
    if let Some((head, _)) = trimmed.split_once(' ') {
        if let Ok(date) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
            return Ok(date);
        }
    }

    Err(PipelineError::DataFormat(format!(
        "unparseable date value '{value}'"
    )))
}

/// Extract dates from a series holding either date values or date strings
pub fn series_dates(series: &Series) -> Result<Vec<NaiveDate>> {
    match series.dtype() {
        DataType::Date => series
            .date()?
            .into_iter()
            .map(|days| {
                days.map(days_to_date).ok_or_else(|| {
                    PipelineError::DataFormat("missing value in date column".to_string())
                })
            })
            .collect(),
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|value| {
                let value = value.ok_or_else(|| {
                    PipelineError::DataFormat("missing value in date column".to_string())
                })?;
                parse_date(value)
            })
            .collect(),
        other => Err(PipelineError::DataFormat(format!(
            "date column has unsupported type {other}"
        ))),
    }
}

/// Extract a numeric series as `Option<f64>` per row
pub fn series_values(series: &Series) -> Result<Vec<Option<f64>>> {
    match series.dtype() {
        DataType::Float64 => Ok(series.f64()?.into_iter().collect()),
        DataType::Float32 => Ok(series
            .f32()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        DataType::Int64 => Ok(series
            .i64()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        DataType::Int32 => Ok(series
            .i32()?
            .into_iter()
            .map(|v| v.map(|v| v as f64))
            .collect()),
        other => Err(PipelineError::DataFormat(format!(
            "column '{}' has non-numeric type {other}",
            series.name()
        ))),
    }
}

/// Build a polars `Date` series from chrono dates
pub fn date_series(name: &str, dates: &[NaiveDate]) -> Result<Series> {
    let days: Vec<i32> = dates.iter().map(|d| date_to_days(*d)).collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

/// Days since the Unix epoch for a date
pub fn date_to_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    (date - epoch).num_days() as i32
}

/// Date for a number of days since the Unix epoch
pub fn days_to_date(days: i32) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    epoch + Duration::days(days as i64)
}

/// The Monday-anchored weekly grid spanning `[start, end]` inclusive.
///
/// The first grid date is the first Monday on or after `start`; subsequent
/// dates step by seven days up to `end`.
pub fn weekly_grid(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut anchor = start;
    while anchor.weekday() != Weekday::Mon {
        anchor += Duration::days(1);
    }

    let mut grid = Vec::new();
    let mut current = anchor;
    while current <= end {
        grid.push(current);
        current += Duration::weeks(1);
    }
    grid
}

/// Consecutive weekly dates starting one week after `last`
pub fn future_weekly_dates(last: NaiveDate, periods: usize) -> Vec<NaiveDate> {
    (1..=periods)
        .map(|i| last + Duration::weeks(i as i64))
        .collect()
}
