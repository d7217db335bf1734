//! Model adapters and forecast value types.
//!
//! The two wrapped libraries (univariate time-series forecasting and
//! supervised regression) sit behind thin adapters sharing the same
//! capability surface: a configured [`Model`] is fitted into a
//! [`FittedModel`] that can forecast a horizon and persist/restore its
//! state. No forecasting logic lives here.

use crate::data::{date_series, series_dates, series_values};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;

pub mod national;
pub mod regional;

/// A configured, not-yet-fitted model adapter
pub trait Model {
    /// Training input
    type Input;
    /// The fitted adapter produced
    type Fitted: FittedModel;

    /// Fit the wrapped library on the input
    fn fit(&self, input: &Self::Input) -> Result<Self::Fitted>;

    /// Name of the model instance
    fn name(&self) -> &str;
}

/// A fitted model adapter
pub trait FittedModel: Sized {
    /// Forecast output
    type Output;

    /// Forecast `horizon` future weekly periods
    fn forecast(&self, horizon: usize) -> Result<Self::Output>;

    /// Persist the model state under `model_dir`
    fn save(&self, model_dir: &Path) -> Result<()>;

    /// Restore a previously saved model for `key` from `model_dir`
    fn load(model_dir: &Path, key: &str) -> Result<Self>;

    /// Name of the model instance
    fn name(&self) -> &str;
}

/// National forecast: one predicted value per date, covering the historical
/// range (in-sample fit) plus the future horizon, with prediction intervals
#[derive(Debug, Clone)]
pub struct AggregateForecast {
    /// Forecast dates, ascending; historical dates first, then the horizon
    pub dates: Vec<NaiveDate>,
    /// Point predictions
    pub yhat: Vec<f64>,
    /// Lower prediction interval bound
    pub yhat_lower: Vec<f64>,
    /// Upper prediction interval bound
    pub yhat_upper: Vec<f64>,
}

impl AggregateForecast {
    /// Create a forecast, checking all columns have the same length
    pub fn new(
        dates: Vec<NaiveDate>,
        yhat: Vec<f64>,
        yhat_lower: Vec<f64>,
        yhat_upper: Vec<f64>,
    ) -> Result<Self> {
        let n = dates.len();
        if yhat.len() != n || yhat_lower.len() != n || yhat_upper.len() != n {
            return Err(PipelineError::ModelPredict(format!(
                "aggregate forecast columns have mismatched lengths \
                 (dates {n}, yhat {}, lower {}, upper {})",
                yhat.len(),
                yhat_lower.len(),
                yhat_upper.len()
            )));
        }
        Ok(Self {
            dates,
            yhat,
            yhat_lower,
            yhat_upper,
        })
    }

    /// Number of forecast rows
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Check whether the forecast is empty
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The predicted value for an exact date, if present
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .iter()
            .position(|d| *d == date)
            .map(|i| self.yhat[i])
    }

    /// Tabular form with `date`, `yhat`, `yhat_lower`, `yhat_upper` columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            date_series("date", &self.dates)?,
            Series::new("yhat", self.yhat.clone()),
            Series::new("yhat_lower", self.yhat_lower.clone()),
            Series::new("yhat_upper", self.yhat_upper.clone()),
        ])?)
    }

    /// Rebuild a forecast from its tabular form
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let dates = series_dates(df.column("date").map_err(|_| {
            PipelineError::DataFormat("forecast table is missing a 'date' column".to_string())
        })?)?;

        let dense = |name: &str| -> Result<Vec<f64>> {
            let series = df.column(name).map_err(|_| {
                PipelineError::DataFormat(format!(
                    "forecast table is missing a '{name}' column"
                ))
            })?;
            series_values(series)?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        PipelineError::DataFormat(format!(
                            "forecast column '{name}' contains missing values"
                        ))
                    })
                })
                .collect()
        };

        Self::new(dates, dense("yhat")?, dense("yhat_lower")?, dense("yhat_upper")?)
    }
}

/// Regional forecast: one predicted value per region per future date
#[derive(Debug, Clone)]
pub struct RegionalForecast {
    /// Future dates, ascending, contiguous weekly
    pub dates: Vec<NaiveDate>,
    /// Predicted values per region, in (region name, values) pairs
    pub regions: Vec<(String, Vec<f64>)>,
}

impl RegionalForecast {
    /// Create a forecast, checking every region covers every date
    pub fn new(dates: Vec<NaiveDate>, regions: Vec<(String, Vec<f64>)>) -> Result<Self> {
        for (region, values) in &regions {
            if values.len() != dates.len() {
                return Err(PipelineError::ModelPredict(format!(
                    "region '{region}' has {} prediction(s) for {} date(s)",
                    values.len(),
                    dates.len()
                )));
            }
        }
        Ok(Self { dates, regions })
    }

    /// Number of future periods covered
    pub fn horizon(&self) -> usize {
        self.dates.len()
    }

    /// Tabular form with a `date` column plus one column per region
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = vec![date_series("date", &self.dates)?];
        for (region, values) in &self.regions {
            columns.push(Series::new(region, values.clone()));
        }
        Ok(DataFrame::new(columns)?)
    }
}
