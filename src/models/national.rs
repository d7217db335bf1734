//! National-level forecast adapter.
//!
//! Wraps the `augurs` univariate forecasting stack: AutoETS, lifted into an
//! MSTL seasonal decomposition (yearly seasonality on weekly data) whenever
//! at least two full seasonal cycles of history exist. The adapter only
//! shapes input/output and persists state; all forecasting happens inside
//! the wrapped library.

use crate::data::future_weekly_dates;
use crate::error::{PipelineError, Result};
use crate::models::{AggregateForecast, FittedModel, Model};
use augurs::{
    ets::AutoETS,
    forecaster::{transforms::LinearInterpolator, Forecaster, Transformer},
    mstl::MSTLModel,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Minimum number of observations required to fit the national model
pub const MIN_OBSERVATIONS: usize = 10;

/// Hyperparameters for the national model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NationalModelParams {
    /// Seasonal period in weeks (52 for yearly seasonality on weekly data)
    #[serde(default = "default_seasonal_period")]
    pub seasonal_period: usize,
    /// Confidence level for prediction intervals
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

fn default_seasonal_period() -> usize {
    52
}

fn default_confidence_level() -> f64 {
    0.95
}

impl Default for NationalModelParams {
    fn default() -> Self {
        Self {
            seasonal_period: default_seasonal_period(),
            confidence_level: default_confidence_level(),
        }
    }
}

impl NationalModelParams {
    /// Check the parameter ranges the wrapped library expects
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.seasonal_period < 2 {
            return Err(format!(
                "seasonal_period must be at least 2, got {}",
                self.seasonal_period
            ));
        }
        if self.confidence_level <= 0.0 || self.confidence_level >= 1.0 {
            return Err(format!(
                "confidence_level must be strictly between 0 and 1, got {}",
                self.confidence_level
            ));
        }
        Ok(())
    }
}

/// A dated national series: the single target stream of the aggregate model
#[derive(Debug, Clone)]
pub struct NationalSeries {
    /// Weekly dates, ascending
    pub dates: Vec<NaiveDate>,
    /// National total per date
    pub values: Vec<f64>,
}

/// Configured national model adapter
#[derive(Debug, Clone)]
pub struct NationalModel {
    key: String,
    params: NationalModelParams,
}

/// Fitted national model adapter.
///
/// The wrapped library is refitted from the stored training state on each
/// forecast call; the persisted artifact is the same state, so a restored
/// model forecasts identically.
#[derive(Debug, Clone)]
pub struct FittedNationalModel {
    key: String,
    params: NationalModelParams,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

/// Opaque persisted state of a fitted national model
#[derive(Debug, Serialize, Deserialize)]
struct NationalArtifact {
    key: String,
    params: NationalModelParams,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl NationalModel {
    /// Create an adapter for one country key
    pub fn new(key: impl Into<String>, params: NationalModelParams) -> Self {
        Self {
            key: key.into(),
            params,
        }
    }
}

impl Model for NationalModel {
    type Input = NationalSeries;
    type Fitted = FittedNationalModel;

    fn fit(&self, input: &NationalSeries) -> Result<FittedNationalModel> {
        if input.dates.len() != input.values.len() {
            return Err(PipelineError::ModelFit(format!(
                "national series has {} date(s) but {} value(s)",
                input.dates.len(),
                input.values.len()
            )));
        }
        if input.values.len() < MIN_OBSERVATIONS {
            return Err(PipelineError::ModelFit(format!(
                "insufficient data for the national model: need at least \
                 {MIN_OBSERVATIONS} observations, got {}",
                input.values.len()
            )));
        }
        if input.values.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::ModelFit(
                "national series contains non-finite values".to_string(),
            ));
        }

        Ok(FittedNationalModel {
            key: self.key.clone(),
            params: self.params.clone(),
            dates: input.dates.clone(),
            values: input.values.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.key
    }
}

impl FittedNationalModel {
    fn artifact_path(model_dir: &Path, key: &str) -> PathBuf {
        model_dir.join(format!("national_model_{key}.json"))
    }

    /// Seasonal decomposition needs at least two full cycles of history
    fn seasonal_period(&self) -> Option<usize> {
        if self.values.len() >= 2 * self.params.seasonal_period {
            Some(self.params.seasonal_period)
        } else {
            None
        }
    }
}

impl FittedModel for FittedNationalModel {
    type Output = AggregateForecast;

    fn forecast(&self, horizon: usize) -> Result<AggregateForecast> {
        if horizon == 0 {
            return Err(PipelineError::ModelPredict(
                "forecast horizon must be positive".to_string(),
            ));
        }

        let level = self.params.confidence_level;
        let (in_sample, future) = match self.seasonal_period() {
            Some(period) => forecast_seasonal(&self.values, period, horizon, level)?,
            None => forecast_trend(&self.values, horizon, level)?,
        };

        if in_sample.point.len() != self.dates.len() {
            return Err(PipelineError::ModelPredict(format!(
                "in-sample forecast covers {} of {} historical dates",
                in_sample.point.len(),
                self.dates.len()
            )));
        }

        let last = *self.dates.last().unwrap();
        let mut dates = self.dates.clone();
        dates.extend(future_weekly_dates(last, horizon));

        let (mut yhat, mut lower, mut upper) = unpack(in_sample);
        let (future_yhat, future_lower, future_upper) = unpack(future);
        yhat.extend(future_yhat);
        lower.extend(future_lower);
        upper.extend(future_upper);

        AggregateForecast::new(dates, yhat, lower, upper)
    }

    fn save(&self, model_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(model_dir)?;
        let path = Self::artifact_path(model_dir, &self.key);
        let file = File::create(path)?;
        let artifact = NationalArtifact {
            key: self.key.clone(),
            params: self.params.clone(),
            dates: self.dates.clone(),
            values: self.values.clone(),
        };
        serde_json::to_writer(file, &artifact)?;
        Ok(())
    }

    fn load(model_dir: &Path, key: &str) -> Result<Self> {
        let path = Self::artifact_path(model_dir, key);
        if !path.exists() {
            return Err(PipelineError::MissingFile(format!(
                "no national model artifact at {}",
                path.display()
            )));
        }
        let file = File::open(path)?;
        let artifact: NationalArtifact = serde_json::from_reader(file)?;
        Ok(Self {
            key: artifact.key,
            params: artifact.params,
            dates: artifact.dates,
            values: artifact.values,
        })
    }

    fn name(&self) -> &str {
        &self.key
    }
}

/// Point forecast plus interval bounds; falls back to +/-20% of the point
/// forecast when the wrapped model reports no intervals
fn unpack(forecast: augurs::Forecast) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let point = forecast.point;
    let (lower, upper) = match forecast.intervals {
        Some(intervals) => (intervals.lower, intervals.upper),
        None => (
            point.iter().map(|v| v * 0.8).collect(),
            point.iter().map(|v| v * 1.2).collect(),
        ),
    };
    (point, lower, upper)
}

/// MSTL seasonal decomposition with an AutoETS trend model
fn forecast_seasonal(
    values: &[f64],
    period: usize,
    horizon: usize,
    level: f64,
) -> Result<(augurs::Forecast, augurs::Forecast)> {
    let trend = AutoETS::non_seasonal().into_trend_model();
    let mstl = MSTLModel::new(vec![period], trend);
    let transformers: Vec<Box<dyn Transformer>> = vec![Box::new(LinearInterpolator::default())];
    let mut forecaster = Forecaster::new(mstl).with_transformers(transformers);

    forecaster
        .fit(values)
        .map_err(|e| PipelineError::ModelFit(format!("MSTL fit error: {e}")))?;
    let in_sample = forecaster
        .predict_in_sample(level)
        .map_err(|e| PipelineError::ModelPredict(format!("MSTL in-sample error: {e}")))?;
    let future = forecaster
        .predict(horizon, level)
        .map_err(|e| PipelineError::ModelPredict(format!("MSTL predict error: {e}")))?;

    Ok((in_sample, future))
}

/// Plain AutoETS, used when the history is too short for decomposition
fn forecast_trend(
    values: &[f64],
    horizon: usize,
    level: f64,
) -> Result<(augurs::Forecast, augurs::Forecast)> {
    let ets = AutoETS::non_seasonal();
    let transformers: Vec<Box<dyn Transformer>> = vec![Box::new(LinearInterpolator::default())];
    let mut forecaster = Forecaster::new(ets).with_transformers(transformers);

    forecaster
        .fit(values)
        .map_err(|e| PipelineError::ModelFit(format!("ETS fit error: {e}")))?;
    let in_sample = forecaster
        .predict_in_sample(level)
        .map_err(|e| PipelineError::ModelPredict(format!("ETS in-sample error: {e}")))?;
    let future = forecaster
        .predict(horizon, level)
        .map_err(|e| PipelineError::ModelPredict(format!("ETS predict error: {e}")))?;

    Ok((in_sample, future))
}
