//! Pipeline configuration loaded from a YAML document.
//!
//! The document enumerates the countries to process, where their raw data
//! lives, and the per-model hyperparameter bags. Everything except
//! `countries.<key>.name` and `countries.<key>.data_path` has a default.

use crate::error::{PipelineError, Result};
use crate::models::national::NationalModelParams;
use crate::models::regional::RegionalModelParams;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default number of future weekly periods to forecast
pub const DEFAULT_FORECAST_PERIODS: usize = 12;

/// Default number of lagged observations per region
pub const DEFAULT_NUM_LAGS: usize = 4;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Countries to process, keyed by a stable identifier (e.g. `country_1`)
    pub countries: BTreeMap<String, CountryConfig>,
    /// Directory where cleaned tables are written
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
    /// Directory where forecast outputs are written
    #[serde(default = "default_forecast_dir")]
    pub forecast_dir: PathBuf,
    /// Directory where model artifacts are written
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    /// Directory where the run log file is created
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// Per-country configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CountryConfig {
    /// Display name, used for cleaned-file naming
    pub name: String,
    /// Location of the raw weekly sales table (CSV)
    pub data_path: PathBuf,
    /// Number of future weekly periods to forecast
    #[serde(default = "default_forecast_periods")]
    pub forecast_periods: usize,
    /// Number of lagged observations per region used as features
    #[serde(default = "default_num_lags")]
    pub num_lags: usize,
    /// Whether to derive a national column as the sum of region columns.
    /// An explicit policy flag, never inferred from the display name.
    #[serde(default)]
    pub derive_national: bool,
    /// Hyperparameter bags for the two wrapped models
    #[serde(default)]
    pub model_params: ModelParams,
}

/// Hyperparameter bags, one per wrapped model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelParams {
    /// National (univariate time-series) model parameters
    #[serde(default)]
    pub national: NationalModelParams,
    /// Regional (supervised regression) model parameters
    #[serde(default)]
    pub regional: RegionalModelParams,
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

fn default_forecast_dir() -> PathBuf {
    PathBuf::from("data/forecasts")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models/saved_models")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_forecast_periods() -> usize {
    DEFAULT_FORECAST_PERIODS
}

fn default_num_lags() -> usize {
    DEFAULT_NUM_LAGS
}

impl PipelineConfig {
    /// Load and validate a configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingFile(format!(
                "configuration file not found at {}",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let config: PipelineConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.countries.is_empty() {
            return Err(PipelineError::Config(
                "at least one country must be configured".to_string(),
            ));
        }

        for (key, country) in &self.countries {
            if country.name.trim().is_empty() {
                return Err(PipelineError::Config(format!(
                    "countries.{key}.name must not be empty"
                )));
            }
            if country.forecast_periods == 0 {
                return Err(PipelineError::Config(format!(
                    "countries.{key}.forecast_periods must be at least 1"
                )));
            }
            if country.num_lags == 0 {
                return Err(PipelineError::Config(format!(
                    "countries.{key}.num_lags must be at least 1"
                )));
            }
            country.model_params.national.validate().map_err(|e| {
                PipelineError::Config(format!("countries.{key}.model_params.national: {e}"))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let yaml = r#"
countries:
  country_1:
    name: Country 1
    data_path: data/raw/sales_country_1.csv
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        let country = &config.countries["country_1"];
        assert_eq!(country.forecast_periods, DEFAULT_FORECAST_PERIODS);
        assert_eq!(country.num_lags, DEFAULT_NUM_LAGS);
        assert!(!country.derive_national);
        assert_eq!(config.processed_dir, PathBuf::from("data/processed"));
    }

    #[test]
    fn zero_num_lags_is_rejected() {
        let yaml = r#"
countries:
  country_1:
    name: Country 1
    data_path: raw.csv
    num_lags: 0
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }
}
