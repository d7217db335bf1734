//! Pipeline orchestration.
//!
//! Countries and stages are processed one at a time, fully sequentially:
//! clean every country, then produce every national forecast, then every
//! regional forecast. Each stage runs inside
//! a timing wrapper that logs start, elapsed time, and failures with
//! country and stage context before propagating the error; any failure
//! aborts the run and earlier completed outputs remain on disk.

use crate::cleaning::DataCleaner;
use crate::config::{CountryConfig, PipelineConfig};
use crate::data::{SalesTable, NATIONAL_COLUMN};
use crate::error::Result;
use crate::features::FeatureBuilder;
use crate::models::national::{NationalModel, NationalSeries};
use crate::models::regional::RegionalModel;
use crate::models::{FittedModel, Model};
use crate::storage;
use chrono::{Local, NaiveDate};
use std::time::Instant;
use tracing::{error, info};

/// The full cleaning/forecasting pipeline for all configured countries
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for every configured country
    pub fn run(&self) -> Result<()> {
        let run_date = Local::now().date_naive();

        for country in self.config.countries.values() {
            timed("clean", &country.name, || {
                self.clean_country(country, run_date)
            })?;
        }

        for (key, country) in &self.config.countries {
            timed("national_forecast", &country.name, || {
                self.national_forecast(key, country)
            })?;
        }

        for (key, country) in &self.config.countries {
            timed("regional_forecast", &country.name, || {
                self.regional_forecast(key, country)
            })?;
        }

        info!("pipeline completed successfully");
        Ok(())
    }

    /// Clean one country's raw table and persist the run-dated result
    fn clean_country(&self, country: &CountryConfig, run_date: NaiveDate) -> Result<()> {
        let raw = SalesTable::from_csv(&country.data_path)?;
        info!(
            rows = raw.len(),
            path = %country.data_path.display(),
            "raw data loaded"
        );

        let cleaned = DataCleaner::new(country.derive_national).clean(raw.into_dataframe())?;
        let path = storage::cleaned_data_path(&self.config.processed_dir, &country.name, run_date);
        cleaned.write_csv(&path)?;
        info!(rows = cleaned.len(), path = %path.display(), "cleaned data saved");
        Ok(())
    }

    /// Fit the national model on the latest cleaned table and persist the
    /// aggregate forecast plus the model artifact
    fn national_forecast(&self, key: &str, country: &CountryConfig) -> Result<()> {
        let cleaned_path =
            storage::latest_cleaned_file(&self.config.processed_dir, &country.name)?;
        let cleaned = SalesTable::from_csv(&cleaned_path)?;
        cleaned.validate_dense()?;

        let series = NationalSeries {
            dates: cleaned.dates()?,
            values: cleaned.column_dense(NATIONAL_COLUMN)?,
        };

        let model = NationalModel::new(key, country.model_params.national.clone());
        let fitted = model.fit(&series)?;
        fitted.save(&self.config.model_dir)?;

        let forecast = fitted.forecast(country.forecast_periods)?;
        let path = storage::national_forecast_path(&self.config.forecast_dir, key);
        storage::write_aggregate_forecast(&forecast, &path)?;
        info!(rows = forecast.len(), path = %path.display(), "national forecast saved");
        Ok(())
    }

    /// Train one regressor per region on lagged features plus the national
    /// forecast, and persist the regional forecast plus per-region artifacts
    fn regional_forecast(&self, key: &str, country: &CountryConfig) -> Result<()> {
        let cleaned_path =
            storage::latest_cleaned_file(&self.config.processed_dir, &country.name)?;
        let cleaned = SalesTable::from_csv(&cleaned_path)?;
        cleaned.validate_dense()?;

        let aggregate_path = storage::national_forecast_path(&self.config.forecast_dir, key);
        let aggregate = storage::read_aggregate_forecast(&aggregate_path)?;

        let feature_set = FeatureBuilder::new(country.num_lags)?.build(&cleaned, &aggregate)?;
        info!(
            rows = feature_set.height(),
            features = feature_set.feature_names().len(),
            "feature table built"
        );

        let model = RegionalModel::new(key, country.model_params.regional.clone());
        let fitted = model.fit(&feature_set)?;
        fitted.save(&self.config.model_dir)?;

        let forecast = fitted.forecast(country.forecast_periods)?;
        let path = storage::regional_forecast_path(&self.config.forecast_dir, key);
        storage::write_regional_forecast(&forecast, &path)?;
        info!(rows = forecast.horizon(), path = %path.display(), "regional forecast saved");
        Ok(())
    }
}

/// Run one stage with start/elapsed/failure logging
fn timed<T>(stage: &str, country: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    info!(stage, country, "starting");
    let start = Instant::now();
    let result = f();
    match &result {
        Ok(_) => info!(
            stage,
            country,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "finished"
        ),
        Err(e) => error!(stage, country, error = %e, "failed"),
    }
    result
}
