//! Error types for the sales_forecast crate

use thiserror::Error;

/// Custom error types for the sales_forecast pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid configuration (bad keys, invalid lag/horizon values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed tabular input (unparseable dates, non-numeric values,
    /// missing required columns)
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// A raw, cleaned, or upstream forecast file could not be found
    #[error("Missing file: {0}")]
    MissingFile(String),

    /// The wrapped forecasting library failed to fit
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// The wrapped forecasting library failed to predict
    #[error("Model predict error: {0}")]
    ModelPredict(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),

    /// Error parsing the YAML configuration document
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error serializing or deserializing a model artifact
    #[error("Artifact error: {0}")]
    Artifact(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<polars::prelude::PolarsError> for PipelineError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        PipelineError::Polars(err.to_string())
    }
}
