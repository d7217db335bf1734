//! Raw table cleaning.
//!
//! [`DataCleaner`] turns one country's raw weekly sales table into a clean,
//! gap-filled, type-normalized table. The five operations run in a fixed
//! order because later steps depend on earlier invariants:
//!
//! 1. date gap-filling onto the Monday-anchored weekly grid
//! 2. national aggregate derivation (policy-driven, per country)
//! 3. type normalization (date column to `Date`, values to `Float64`)
//! 4. missing-value backward fill
//! 5. column-name normalization
//!
//! All operations are pure transforms; persistence lives in [`crate::storage`].

use crate::data::{
    date_series, detect_date_column, is_national_column, is_region_column, series_dates,
    series_values, weekly_grid, SalesTable, NATIONAL_COLUMN,
};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};

/// Cleans one country's raw sales table
#[derive(Debug, Clone)]
pub struct DataCleaner {
    /// Whether a missing national column is derived as the sum of regions
    derive_national: bool,
}

impl DataCleaner {
    /// Create a cleaner with an explicit national-derivation policy
    pub fn new(derive_national: bool) -> Self {
        Self { derive_national }
    }

    /// Run the full cleaning sequence
    pub fn clean(&self, df: DataFrame) -> Result<SalesTable> {
        let df = Self::add_missing_dates(df)?;
        let df = Self::add_national_column(df, self.derive_national)?;
        let df = Self::set_data_types(df)?;
        let df = Self::backward_fill(df)?;
        let df = Self::normalize_column_names(df)?;
        Ok(SalesTable::from_dataframe(df))
    }

    /// Reindex the table onto the Monday-anchored weekly grid spanning
    /// `[min(date), max(date)]`. Missing grid dates get all-null rows;
    /// rows whose date falls off the grid are dropped. Duplicate dates
    /// are an error.
    pub fn add_missing_dates(df: DataFrame) -> Result<DataFrame> {
        let date_column = detect_date_column(&df)?;
        let dates = series_dates(df.column(&date_column)?)?;

        if dates.is_empty() {
            return Err(PipelineError::DataFormat(
                "raw table contains no rows".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for date in &dates {
            if !seen.insert(*date) {
                return Err(PipelineError::DataFormat(format!(
                    "duplicate date {date} in raw table"
                )));
            }
        }

        let min = *dates.iter().min().unwrap();
        let max = *dates.iter().max().unwrap();
        let grid = weekly_grid(min, max);
        if grid.is_empty() {
            return Err(PipelineError::DataFormat(format!(
                "no Monday-anchored week falls within [{min}, {max}]"
            )));
        }

        let index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut columns = Vec::with_capacity(df.width());
        columns.push(date_series(&date_column, &grid)?);
        for series in df.get_columns() {
            if series.name() == date_column {
                continue;
            }
            columns.push(reindex_column(series, &index, &grid)?);
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Add a national total column as the row-sum of the region columns.
    ///
    /// Only applied when the country's `derive_national` policy is set and
    /// no national column exists. Rows where every region value is missing
    /// keep a missing national value so backward fill can resolve it.
    pub fn add_national_column(df: DataFrame, derive_national: bool) -> Result<DataFrame> {
        if !derive_national {
            return Ok(df);
        }
        if df.get_column_names().iter().any(|n| is_national_column(n)) {
            return Ok(df);
        }

        let region_columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|n| is_region_column(n))
            .map(|n| n.to_string())
            .collect();
        if region_columns.is_empty() {
            return Err(PipelineError::DataFormat(
                "cannot derive national column: no region columns found".to_string(),
            ));
        }

        let mut totals: Vec<Option<f64>> = vec![None; df.height()];
        for name in &region_columns {
            let values = numeric_values(df.column(name)?)?;
            for (total, value) in totals.iter_mut().zip(values) {
                if let Some(v) = value {
                    *total = Some(total.unwrap_or(0.0) + v);
                }
            }
        }

        let mut df = df;
        df.with_column(Series::new(NATIONAL_COLUMN, totals))?;
        Ok(df)
    }

    /// Coerce the date column to `Date` and every value column to `Float64`.
    /// Non-numeric values that cannot be coerced are an error.
    pub fn set_data_types(df: DataFrame) -> Result<DataFrame> {
        let date_column = detect_date_column(&df)?;

        let mut columns = Vec::with_capacity(df.width());
        for series in df.get_columns() {
            if series.name() == date_column {
                let dates = series_dates(series)?;
                columns.push(date_series(&date_column, &dates)?);
            } else {
                let values = numeric_values(series)?;
                columns.push(Series::new(series.name(), values));
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Replace every missing value with the next non-missing value later in
    /// the date-sorted sequence.
    ///
    /// Trailing missing values have no later observation and remain missing;
    /// consumers must not assume fully dense output
    /// (see [`SalesTable::validate_dense`]).
    pub fn backward_fill(df: DataFrame) -> Result<DataFrame> {
        let date_column = detect_date_column(&df)?;

        let mut columns = Vec::with_capacity(df.width());
        for series in df.get_columns() {
            if series.name() == date_column {
                columns.push(series.clone());
            } else {
                columns.push(series.fill_null(FillNullStrategy::Backward(None))?);
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Lowercase all column names and replace spaces with underscores.
    /// Idempotent: normalizing an already-normalized schema is a no-op.
    pub fn normalize_column_names(df: DataFrame) -> Result<DataFrame> {
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(normalize_name)
            .collect();

        let mut df = df;
        df.set_column_names(&names)?;
        Ok(df)
    }
}

/// Canonical lowercase/underscore form of a column name
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Numeric view of a column, parsing strings where needed.
/// Empty cells and nulls stay missing; anything else unparseable fails.
fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|value| match value {
                None => Ok(None),
                Some(v) if v.trim().is_empty() => Ok(None),
                Some(v) => v.trim().parse::<f64>().map(Some).map_err(|_| {
                    PipelineError::DataFormat(format!(
                        "non-numeric value '{v}' in column '{}'",
                        series.name()
                    ))
                }),
            })
            .collect(),
        DataType::Null => Ok(vec![None; series.len()]),
        _ => series_values(series),
    }
}

/// Reindex one value column onto the weekly grid
fn reindex_column(
    series: &Series,
    index: &HashMap<NaiveDate, usize>,
    grid: &[NaiveDate],
) -> Result<Series> {
    let pick = |date: &NaiveDate| index.get(date).copied();

    match series.dtype() {
        DataType::Utf8 => {
            let ca = series.utf8()?;
            let values: Vec<Option<String>> = grid
                .iter()
                .map(|d| pick(d).and_then(|i| ca.get(i)).map(str::to_string))
                .collect();
            Ok(Series::new(series.name(), values))
        }
        DataType::Int64 => {
            let ca = series.i64()?;
            let values: Vec<Option<i64>> =
                grid.iter().map(|d| pick(d).and_then(|i| ca.get(i))).collect();
            Ok(Series::new(series.name(), values))
        }
        DataType::Int32 => {
            let ca = series.i32()?;
            let values: Vec<Option<i32>> =
                grid.iter().map(|d| pick(d).and_then(|i| ca.get(i))).collect();
            Ok(Series::new(series.name(), values))
        }
        DataType::Float64 => {
            let ca = series.f64()?;
            let values: Vec<Option<f64>> =
                grid.iter().map(|d| pick(d).and_then(|i| ca.get(i))).collect();
            Ok(Series::new(series.name(), values))
        }
        _ => {
            let cast = series.cast(&DataType::Float64)?;
            let ca = cast.f64()?;
            let values: Vec<Option<f64>> =
                grid.iter().map(|d| pick(d).and_then(|i| ca.get(i))).collect();
            Ok(Series::new(series.name(), values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(dates: &[&str], region_1: &[Option<f64>]) -> DataFrame {
        let dates: Vec<String> = dates.iter().map(|s| s.to_string()).collect();
        DataFrame::new(vec![
            Series::new("Date", dates),
            Series::new("Region 1", region_1.to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn gap_fill_inserts_null_rows() {
        // Mondays with 2024-01-08 missing
        let df = raw_frame(
            &["2024-01-01", "2024-01-15"],
            &[Some(10.0), Some(20.0)],
        );
        let filled = DataCleaner::add_missing_dates(df).unwrap();

        assert_eq!(filled.height(), 3);
        assert_eq!(filled.column("Region 1").unwrap().null_count(), 1);
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let df = raw_frame(
            &["2024-01-01", "2024-01-01"],
            &[Some(10.0), Some(11.0)],
        );
        assert!(matches!(
            DataCleaner::add_missing_dates(df),
            Err(PipelineError::DataFormat(_))
        ));
    }

    #[test]
    fn national_column_is_left_untouched_when_present() {
        let df = DataFrame::new(vec![
            Series::new("Date", vec!["2024-01-01"]),
            Series::new("Region 1", vec![1.0]),
            Series::new("National", vec![99.0]),
        ])
        .unwrap();
        let out = DataCleaner::add_national_column(df, true).unwrap();
        let national = out.column("National").unwrap().f64().unwrap();
        assert_eq!(national.get(0), Some(99.0));
    }

    #[test]
    fn non_numeric_value_is_a_data_format_error() {
        let df = DataFrame::new(vec![
            Series::new("Date", vec!["2024-01-01"]),
            Series::new("Region 1", vec!["not a number"]),
        ])
        .unwrap();
        assert!(matches!(
            DataCleaner::set_data_types(df),
            Err(PipelineError::DataFormat(_))
        ));
    }
}
