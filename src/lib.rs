//! # Sales Forecast
//!
//! A sequential pipeline that cleans weekly regional sales data per
//! country, forecasts the national total with a univariate time-series
//! model, and then forecasts each region with a supervised regressor fed
//! by lagged regional sales plus the national forecast.
//!
//! The pipeline's own code is cleaning, feature engineering, and
//! orchestration; the forecasting itself is delegated to external
//! libraries behind thin adapters.
//!
//! ## Stages
//!
//! 1. **Cleaning** ([`cleaning::DataCleaner`]): gap-fill onto the
//!    Monday-anchored weekly grid, optional national-total derivation,
//!    float coercion, backward fill, column-name normalization.
//! 2. **National forecast** ([`models::national::NationalModel`]):
//!    in-sample fit plus a configurable future horizon.
//! 3. **Feature engineering** ([`features::FeatureBuilder`]): lag-1..N
//!    columns per region plus the national forecast as an exogenous column.
//! 4. **Regional forecast** ([`models::regional::RegionalModel`]): one
//!    regressor per region, one prediction per region per future week.
//!
//! ## Quick start
//!
//! ```no_run
//! use sales_forecast::config::PipelineConfig;
//! use sales_forecast::pipeline::Pipeline;
//!
//! # fn main() -> sales_forecast::error::Result<()> {
//! let config = PipelineConfig::from_yaml("configs/config.yaml")?;
//! Pipeline::new(config).run()?;
//! # Ok(())
//! # }
//! ```

pub mod cleaning;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use crate::cleaning::DataCleaner;
pub use crate::config::PipelineConfig;
pub use crate::data::SalesTable;
pub use crate::error::{PipelineError, Result};
pub use crate::features::{FeatureBuilder, FeatureSet};
pub use crate::models::{AggregateForecast, FittedModel, Model, RegionalForecast};
pub use crate::pipeline::Pipeline;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
