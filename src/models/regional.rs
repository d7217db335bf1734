//! Region-level forecast adapter.
//!
//! Wraps `smartcore` random-forest regression, trained independently per
//! region (no cross-region parameter sharing). The adapter prepares the
//! per-region training/inference matrices and persists one artifact per
//! region; the regression algorithm itself is the wrapped library's.

use crate::data::future_weekly_dates;
use crate::error::{PipelineError, Result};
use crate::features::FeatureSet;
use crate::models::{FittedModel, Model, RegionalForecast};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Hyperparameters for the per-region regressors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalModelParams {
    /// Number of trees in each forest
    #[serde(default = "default_n_trees")]
    pub n_trees: u16,
    /// Maximum tree depth; unlimited when absent
    #[serde(default)]
    pub max_depth: Option<u16>,
    /// Minimum number of samples per leaf
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Seed for deterministic training
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_n_trees() -> u16 {
    100
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

impl Default for RegionalModelParams {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            max_depth: None,
            min_samples_leaf: default_min_samples_leaf(),
            seed: default_seed(),
        }
    }
}

/// Configured regional model adapter
#[derive(Debug, Clone)]
pub struct RegionalModel {
    key: String,
    params: RegionalModelParams,
}

/// Fitted regional model adapter: one forest per region plus the feature
/// rows needed to build the inference matrix for the horizon
#[derive(Debug)]
pub struct FittedRegionalModel {
    key: String,
    params: RegionalModelParams,
    feature_names: Vec<String>,
    region_names: Vec<String>,
    forests: BTreeMap<String, Forest>,
    feature_rows: Vec<Vec<f64>>,
    last_date: NaiveDate,
}

/// Opaque persisted state of one region's fitted regressor.
///
/// Each artifact is self-contained: it carries the shared feature state so
/// a single region's file is enough to rebuild that region's predictions.
#[derive(Deserialize)]
struct RegionalArtifact {
    key: String,
    region: String,
    params: RegionalModelParams,
    feature_names: Vec<String>,
    region_names: Vec<String>,
    feature_rows: Vec<Vec<Option<f64>>>,
    last_date: NaiveDate,
    forest: Forest,
}

/// Borrowed view of [`RegionalArtifact`] used when writing
#[derive(Serialize)]
struct RegionalArtifactRef<'a> {
    key: &'a str,
    region: &'a str,
    params: &'a RegionalModelParams,
    feature_names: &'a [String],
    region_names: &'a [String],
    feature_rows: &'a [Vec<Option<f64>>],
    last_date: NaiveDate,
    forest: &'a Forest,
}

impl RegionalModel {
    /// Create an adapter for one country key
    pub fn new(key: impl Into<String>, params: RegionalModelParams) -> Self {
        Self {
            key: key.into(),
            params,
        }
    }
}

impl Model for RegionalModel {
    type Input = FeatureSet;
    type Fitted = FittedRegionalModel;

    fn fit(&self, input: &FeatureSet) -> Result<FittedRegionalModel> {
        if input.height() == 0 {
            return Err(PipelineError::ModelFit(
                "regional training set is empty".to_string(),
            ));
        }

        let feature_rows = input.feature_matrix()?;
        let x = DenseMatrix::from_2d_vec(&feature_rows);
        let region_names = input.region_columns();
        let last_date = input.last_date()?;

        let mut forests = BTreeMap::new();
        for region in &region_names {
            let y = input.target(region)?;
            let forest = Forest::fit(&x, &y, self.parameters()).map_err(|e| {
                PipelineError::ModelFit(format!(
                    "random forest fit failed for region '{region}': {e}"
                ))
            })?;
            forests.insert(region.clone(), forest);
        }

        Ok(FittedRegionalModel {
            key: self.key.clone(),
            params: self.params.clone(),
            feature_names: input.feature_names(),
            region_names,
            forests,
            feature_rows,
            last_date,
        })
    }

    fn name(&self) -> &str {
        &self.key
    }
}

impl RegionalModel {
    fn parameters(&self) -> RandomForestRegressorParameters {
        let mut parameters = RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees.into())
            .with_min_samples_leaf(self.params.min_samples_leaf)
            .with_seed(self.params.seed);
        if let Some(depth) = self.params.max_depth {
            parameters = parameters.with_max_depth(depth);
        }
        parameters
    }
}

impl FittedRegionalModel {
    fn artifact_path(model_dir: &Path, key: &str, region: &str) -> PathBuf {
        model_dir.join(format!("regional_model_{key}_{region}.json"))
    }

    /// Regions this model predicts, in output column order
    pub fn regions(&self) -> &[String] {
        &self.region_names
    }

    /// Feature columns the forests were trained on
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl FittedModel for FittedRegionalModel {
    type Output = RegionalForecast;

    /// Predict one value per region for `horizon` future weekly dates,
    /// using the most recent `horizon` feature rows as the inference matrix
    fn forecast(&self, horizon: usize) -> Result<RegionalForecast> {
        if horizon == 0 {
            return Err(PipelineError::ModelPredict(
                "forecast horizon must be positive".to_string(),
            ));
        }
        if horizon > self.feature_rows.len() {
            return Err(PipelineError::ModelPredict(format!(
                "horizon {} exceeds the {} available feature row(s)",
                horizon,
                self.feature_rows.len()
            )));
        }

        let tail = self.feature_rows[self.feature_rows.len() - horizon..].to_vec();
        let x = DenseMatrix::from_2d_vec(&tail);

        let mut regions = Vec::with_capacity(self.region_names.len());
        for region in &self.region_names {
            let forest = self.forests.get(region).ok_or_else(|| {
                PipelineError::ModelPredict(format!("no fitted model for region '{region}'"))
            })?;
            let predictions = forest.predict(&x).map_err(|e| {
                PipelineError::ModelPredict(format!(
                    "random forest predict failed for region '{region}': {e}"
                ))
            })?;
            regions.push((region.clone(), predictions));
        }

        let dates = future_weekly_dates(self.last_date, horizon);
        RegionalForecast::new(dates, regions)
    }

    fn save(&self, model_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(model_dir)?;
        let feature_rows: Vec<Vec<Option<f64>>> = self
            .feature_rows
            .iter()
            .map(|row| row.iter().map(|v| v.is_finite().then_some(*v)).collect())
            .collect();

        for (region, forest) in &self.forests {
            let path = Self::artifact_path(model_dir, &self.key, region);
            let file = File::create(path)?;
            let artifact = RegionalArtifactRef {
                key: &self.key,
                region,
                params: &self.params,
                feature_names: &self.feature_names,
                region_names: &self.region_names,
                feature_rows: &feature_rows,
                last_date: self.last_date,
                forest,
            };
            serde_json::to_writer(file, &artifact)?;
        }
        Ok(())
    }

    fn load(model_dir: &Path, key: &str) -> Result<Self> {
        let prefix = format!("regional_model_{key}_");
        let mut artifacts = Vec::new();
        if model_dir.is_dir() {
            for entry in std::fs::read_dir(model_dir)? {
                let path = entry?.path();
                let file_name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name,
                    None => continue,
                };
                if file_name.starts_with(&prefix) && file_name.ends_with(".json") {
                    let file = File::open(&path)?;
                    let artifact: RegionalArtifact = serde_json::from_reader(file)?;
                    artifacts.push(artifact);
                }
            }
        }

        if artifacts.is_empty() {
            return Err(PipelineError::MissingFile(format!(
                "no regional model artifacts for '{key}' under {}",
                model_dir.display()
            )));
        }

        let first = &artifacts[0];
        let feature_rows: Vec<Vec<f64>> = first
            .feature_rows
            .iter()
            .map(|row| row.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();

        let mut model = FittedRegionalModel {
            key: first.key.clone(),
            params: first.params.clone(),
            feature_names: first.feature_names.clone(),
            region_names: first.region_names.clone(),
            forests: BTreeMap::new(),
            feature_rows,
            last_date: first.last_date,
        };
        for artifact in artifacts {
            model.forests.insert(artifact.region, artifact.forest);
        }

        for region in &model.region_names {
            if !model.forests.contains_key(region) {
                return Err(PipelineError::MissingFile(format!(
                    "regional model artifact for '{key}' region '{region}' is missing"
                )));
            }
        }

        Ok(model)
    }

    fn name(&self) -> &str {
        &self.key
    }
}
