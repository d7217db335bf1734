//! Regression feature engineering.
//!
//! [`FeatureBuilder`] turns a cleaned sales table plus a national forecast
//! into a [`FeatureSet`]: lag-1..N columns per region, the national
//! forecast merged as an exogenous column, and the raw per-region values
//! split off as targets.

use crate::data::{detect_date_column, SalesTable};
use crate::error::{PipelineError, Result};
use crate::models::AggregateForecast;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;

/// Name of the exogenous national forecast column
pub const EXOG_COLUMN: &str = "national_forecast";

/// Builds regression-ready feature tables
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    num_lags: usize,
}

/// A regression-ready table: features, per-region targets, and the date of
/// each remaining row
#[derive(Debug, Clone)]
pub struct FeatureSet {
    features: DataFrame,
    targets: DataFrame,
    dates: Vec<NaiveDate>,
}

impl FeatureBuilder {
    /// Create a builder adding `num_lags` lagged columns per region
    pub fn new(num_lags: usize) -> Result<Self> {
        if num_lags == 0 {
            return Err(PipelineError::Config(
                "num_lags must be at least 1".to_string(),
            ));
        }
        Ok(Self { num_lags })
    }

    /// Build the feature table.
    ///
    /// The aggregate forecast is left-joined by exact date; historical dates
    /// with no matching forecast entry keep a missing exogenous value. Rows
    /// with a missing value in any lag column (the first `num_lags` rows of
    /// a dense table) are dropped, so the training data is fully dense in
    /// the lag columns.
    pub fn build(
        &self,
        cleaned: &SalesTable,
        aggregate: &AggregateForecast,
    ) -> Result<FeatureSet> {
        let height = cleaned.len();
        if self.num_lags >= height {
            return Err(PipelineError::Config(format!(
                "num_lags ({}) must be strictly less than the number of \
                 historical rows ({height})",
                self.num_lags
            )));
        }

        let dates = cleaned.dates()?;
        let region_columns = cleaned.region_columns();
        if region_columns.is_empty() {
            return Err(PipelineError::DataFormat(
                "cleaned table has no region columns".to_string(),
            ));
        }

        let mut df = cleaned.dataframe().clone();

        // Exogenous national forecast, aligned by exact date
        let by_date: HashMap<NaiveDate, f64> = aggregate
            .dates
            .iter()
            .copied()
            .zip(aggregate.yhat.iter().copied())
            .collect();
        let exog: Vec<Option<f64>> = dates.iter().map(|d| by_date.get(d).copied()).collect();
        df.with_column(Series::new(EXOG_COLUMN, exog))?;

        // Lagged observations per region
        let mut lag_columns = Vec::new();
        for region in &region_columns {
            let base = df.column(region)?.clone();
            for lag in 1..=self.num_lags {
                let mut shifted = base.shift(lag as i64);
                let name = format!("{region}_lag{lag}");
                shifted.rename(&name);
                lag_columns.push(name);
                df.with_column(shifted)?;
            }
        }

        // Training rows must be fully dense in the lag columns
        let mut mask = BooleanChunked::full("lag_mask", true, df.height());
        for name in &lag_columns {
            mask = &mask & &df.column(name)?.is_not_null();
        }
        let filtered = df.filter(&mask)?;

        let kept_dates: Vec<NaiveDate> = dates
            .iter()
            .zip(mask.into_iter())
            .filter_map(|(d, keep)| match keep {
                Some(true) => Some(*d),
                _ => None,
            })
            .collect();

        let targets = filtered.select(region_columns.clone())?;

        let date_column = detect_date_column(&filtered)?;
        let mut features = filtered.drop(&date_column)?;
        for region in &region_columns {
            features = features.drop(region)?;
        }

        Ok(FeatureSet {
            features,
            targets,
            dates: kept_dates,
        })
    }
}

impl FeatureSet {
    /// Feature column names, in matrix column order
    pub fn feature_names(&self) -> Vec<String> {
        self.features
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Target region names
    pub fn region_columns(&self) -> Vec<String> {
        self.targets
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Number of usable rows
    pub fn height(&self) -> usize {
        self.features.height()
    }

    /// Dates of the remaining rows, ascending
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Date of the last historical row
    pub fn last_date(&self) -> Result<NaiveDate> {
        self.dates.last().copied().ok_or_else(|| {
            PipelineError::DataFormat("feature table has no rows".to_string())
        })
    }

    /// The feature frame (everything except the date and raw region values)
    pub fn features(&self) -> &DataFrame {
        &self.features
    }

    /// The target frame (raw per-region values)
    pub fn targets(&self) -> &DataFrame {
        &self.targets
    }

    /// Row-major feature matrix; missing exogenous values become NaN
    pub fn feature_matrix(&self) -> Result<Vec<Vec<f64>>> {
        let mut columns = Vec::with_capacity(self.features.width());
        for series in self.features.get_columns() {
            columns.push(series.f64()?.clone());
        }

        let mut rows = Vec::with_capacity(self.features.height());
        for row in 0..self.features.height() {
            rows.push(
                columns
                    .iter()
                    .map(|ca| ca.get(row).unwrap_or(f64::NAN))
                    .collect(),
            );
        }
        Ok(rows)
    }

    /// A region's target values; missing targets are an error
    pub fn target(&self, region: &str) -> Result<Vec<f64>> {
        let series = self.targets.column(region).map_err(|_| {
            PipelineError::DataFormat(format!("no target column for region '{region}'"))
        })?;
        series
            .f64()?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    PipelineError::DataFormat(format!(
                        "target column '{region}' contains missing values"
                    ))
                })
            })
            .collect()
    }
}
