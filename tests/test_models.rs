use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use sales_forecast::data::SalesTable;
use sales_forecast::error::PipelineError;
use sales_forecast::features::FeatureBuilder;
use sales_forecast::models::national::{
    FittedNationalModel, NationalModel, NationalModelParams, NationalSeries, MIN_OBSERVATIONS,
};
use sales_forecast::models::regional::{FittedRegionalModel, RegionalModel, RegionalModelParams};
use sales_forecast::models::{AggregateForecast, FittedModel, Model};
use tempfile::tempdir;

fn monday(week: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 6, 5).unwrap() + Duration::weeks(week)
}

fn national_series(n: usize) -> NationalSeries {
    NationalSeries {
        dates: (0..n as i64).map(monday).collect(),
        values: (0..n)
            .map(|i| 100.0 + 2.0 * i as f64 + if i % 2 == 0 { 1.5 } else { -1.5 })
            .collect(),
    }
}

fn approx_eq(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
}

#[test]
fn national_forecast_covers_history_plus_horizon() {
    let series = national_series(30);
    let model = NationalModel::new("country_1", NationalModelParams::default());
    let fitted = model.fit(&series).unwrap();

    let forecast = fitted.forecast(6).unwrap();
    assert_eq!(forecast.len(), 36);
    assert_eq!(forecast.dates[..30], series.dates[..]);
    assert_eq!(forecast.dates[30], monday(30));
    assert_eq!(forecast.dates[35], monday(35));

    assert!(forecast.yhat.iter().all(|v| v.is_finite()));
    for i in 0..forecast.len() {
        assert!(forecast.yhat_lower[i] <= forecast.yhat_upper[i]);
    }
}

#[test]
fn national_model_needs_a_minimum_history() {
    let series = national_series(MIN_OBSERVATIONS - 1);
    let model = NationalModel::new("country_1", NationalModelParams::default());
    assert!(matches!(model.fit(&series), Err(PipelineError::ModelFit(_))));
}

#[test]
fn national_model_rejects_mismatched_series() {
    let mut series = national_series(20);
    series.values.pop();
    let model = NationalModel::new("country_1", NationalModelParams::default());
    assert!(matches!(model.fit(&series), Err(PipelineError::ModelFit(_))));
}

#[test]
fn national_model_rejects_non_finite_values() {
    let mut series = national_series(20);
    series.values[3] = f64::NAN;
    let model = NationalModel::new("country_1", NationalModelParams::default());
    assert!(matches!(model.fit(&series), Err(PipelineError::ModelFit(_))));
}

#[test]
fn zero_horizon_is_a_predict_error() {
    let series = national_series(20);
    let model = NationalModel::new("country_1", NationalModelParams::default());
    let fitted = model.fit(&series).unwrap();
    assert!(matches!(
        fitted.forecast(0),
        Err(PipelineError::ModelPredict(_))
    ));
}

#[test]
fn restored_national_model_forecasts_identically() {
    let dir = tempdir().unwrap();
    let series = national_series(30);
    let model = NationalModel::new("country_1", NationalModelParams::default());
    let fitted = model.fit(&series).unwrap();
    fitted.save(dir.path()).unwrap();

    let restored = FittedNationalModel::load(dir.path(), "country_1").unwrap();
    assert_eq!(restored.name(), "country_1");

    let original = fitted.forecast(4).unwrap();
    let replayed = restored.forecast(4).unwrap();
    assert_eq!(original.dates, replayed.dates);
    assert!(approx_eq(&original.yhat, &replayed.yhat));
}

#[test]
fn loading_a_missing_national_artifact_fails() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        FittedNationalModel::load(dir.path(), "country_1"),
        Err(PipelineError::MissingFile(_))
    ));
}

fn feature_set(rows: usize, num_lags: usize) -> sales_forecast::features::FeatureSet {
    let dates: Vec<String> = (0..rows as i64)
        .map(|w| monday(w).format("%Y-%m-%d").to_string())
        .collect();
    let region_1: Vec<f64> = (0..rows).map(|i| 10.0 + i as f64).collect();
    let region_2: Vec<f64> = (0..rows).map(|i| 40.0 + 2.0 * i as f64).collect();
    let national: Vec<f64> = region_1.iter().zip(&region_2).map(|(a, b)| a + b).collect();

    let table = SalesTable::from_dataframe(
        DataFrame::new(vec![
            Series::new("date", dates),
            Series::new("region_1", region_1),
            Series::new("region_2", region_2),
            Series::new("national", national.clone()),
        ])
        .unwrap(),
    );

    let forecast_dates = table.dates().unwrap();
    let lower: Vec<f64> = national.iter().map(|v| v - 5.0).collect();
    let upper: Vec<f64> = national.iter().map(|v| v + 5.0).collect();
    let aggregate = AggregateForecast::new(forecast_dates, national, lower, upper).unwrap();

    FeatureBuilder::new(num_lags)
        .unwrap()
        .build(&table, &aggregate)
        .unwrap()
}

fn small_forest_params() -> RegionalModelParams {
    RegionalModelParams {
        n_trees: 10,
        max_depth: Some(4),
        min_samples_leaf: 1,
        seed: 7,
    }
}

#[test]
fn regional_forecast_has_one_row_per_future_week() {
    let set = feature_set(20, 3);
    let model = RegionalModel::new("country_1", small_forest_params());
    let fitted = model.fit(&set).unwrap();

    let forecast = fitted.forecast(4).unwrap();
    assert_eq!(forecast.horizon(), 4);
    // The future grid continues one week after the last training row
    assert_eq!(forecast.dates[0], monday(20));
    assert_eq!(forecast.dates[3], monday(23));

    assert_eq!(forecast.regions.len(), 2);
    for (region, values) in &forecast.regions {
        assert_eq!(values.len(), 4);
        assert!(values.iter().all(|v| v.is_finite()), "region {region}");
    }
}

#[test]
fn regional_horizon_cannot_exceed_available_rows() {
    let set = feature_set(10, 3);
    let model = RegionalModel::new("country_1", small_forest_params());
    let fitted = model.fit(&set).unwrap();

    // Only 7 feature rows survive the lagging
    assert!(fitted.forecast(7).is_ok());
    assert!(matches!(
        fitted.forecast(8),
        Err(PipelineError::ModelPredict(_))
    ));
}

#[test]
fn restored_regional_model_predicts_identically() {
    let dir = tempdir().unwrap();
    let set = feature_set(20, 3);
    let model = RegionalModel::new("country_1", small_forest_params());
    let fitted = model.fit(&set).unwrap();
    fitted.save(dir.path()).unwrap();

    assert!(dir
        .path()
        .join("regional_model_country_1_region_1.json")
        .exists());
    assert!(dir
        .path()
        .join("regional_model_country_1_region_2.json")
        .exists());

    let restored = FittedRegionalModel::load(dir.path(), "country_1").unwrap();
    assert_eq!(restored.regions(), fitted.regions());
    assert_eq!(restored.feature_names(), fitted.feature_names());

    let original = fitted.forecast(4).unwrap();
    let replayed = restored.forecast(4).unwrap();
    assert_eq!(original.dates, replayed.dates);
    for ((name_a, values_a), (name_b, values_b)) in
        original.regions.iter().zip(&replayed.regions)
    {
        assert_eq!(name_a, name_b);
        assert!(approx_eq(values_a, values_b));
    }
}

#[test]
fn loading_missing_regional_artifacts_fails() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        FittedRegionalModel::load(dir.path(), "country_1"),
        Err(PipelineError::MissingFile(_))
    ));
}
