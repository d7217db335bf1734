use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use sales_forecast::data::SalesTable;
use sales_forecast::error::PipelineError;
use sales_forecast::features::{FeatureBuilder, EXOG_COLUMN};
use sales_forecast::models::AggregateForecast;

fn monday(week: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::weeks(week)
}

fn cleaned_table(region_1: Vec<f64>) -> SalesTable {
    let n = region_1.len();
    let dates: Vec<String> = (0..n as i64)
        .map(|w| monday(w).format("%Y-%m-%d").to_string())
        .collect();
    let national: Vec<f64> = region_1.iter().map(|v| v * 3.0).collect();
    SalesTable::from_dataframe(
        DataFrame::new(vec![
            Series::new("date", dates),
            Series::new("region_1", region_1),
            Series::new("national", national),
        ])
        .unwrap(),
    )
}

fn full_aggregate(table: &SalesTable) -> AggregateForecast {
    let dates = table.dates().unwrap();
    let yhat: Vec<f64> = (0..dates.len()).map(|i| 100.0 + i as f64).collect();
    let lower: Vec<f64> = yhat.iter().map(|v| v - 10.0).collect();
    let upper: Vec<f64> = yhat.iter().map(|v| v + 10.0).collect();
    AggregateForecast::new(dates, yhat, lower, upper).unwrap()
}

#[test]
fn lag_columns_hold_prior_observations() {
    let table = cleaned_table(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let aggregate = full_aggregate(&table);

    let set = FeatureBuilder::new(2).unwrap().build(&table, &aggregate).unwrap();
    assert_eq!(set.height(), 3);
    assert_eq!(set.dates(), &[monday(2), monday(3), monday(4)]);
    assert_eq!(set.target("region_1").unwrap(), vec![3.0, 4.0, 5.0]);

    let names = set.feature_names();
    let lag1 = names.iter().position(|n| n == "region_1_lag1").unwrap();
    let lag2 = names.iter().position(|n| n == "region_1_lag2").unwrap();

    // The row whose target is 4.0 saw 3.0 one week back and 2.0 two weeks back
    let matrix = set.feature_matrix().unwrap();
    assert_eq!(matrix[1][lag1], 3.0);
    assert_eq!(matrix[1][lag2], 2.0);
}

#[test]
fn features_exclude_date_and_raw_region_values() {
    let table = cleaned_table(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let aggregate = full_aggregate(&table);

    let set = FeatureBuilder::new(1).unwrap().build(&table, &aggregate).unwrap();
    let names = set.feature_names();
    assert!(!names.iter().any(|n| n == "date"));
    assert!(!names.iter().any(|n| n == "region_1"));
    assert!(names.iter().any(|n| n == "national"));
    assert!(names.iter().any(|n| n == EXOG_COLUMN));
    assert!(names.iter().any(|n| n == "region_1_lag1"));

    assert_eq!(set.region_columns(), vec!["region_1".to_string()]);
}

#[rstest]
#[case(10, 4, 6)]
#[case(8, 1, 7)]
#[case(5, 4, 1)]
fn lagging_drops_exactly_num_lags_rows(
    #[case] rows: usize,
    #[case] num_lags: usize,
    #[case] expected: usize,
) {
    let table = cleaned_table((0..rows).map(|i| i as f64 + 1.0).collect());
    let aggregate = full_aggregate(&table);

    let set = FeatureBuilder::new(num_lags)
        .unwrap()
        .build(&table, &aggregate)
        .unwrap();
    assert_eq!(set.height(), expected);
}

#[test]
fn rows_without_a_forecast_entry_keep_a_missing_exogenous_value() {
    let table = cleaned_table(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let dates = table.dates().unwrap();

    // Forecast covers only the first three weeks
    let aggregate = AggregateForecast::new(
        dates[..3].to_vec(),
        vec![10.0, 11.0, 12.0],
        vec![9.0, 10.0, 11.0],
        vec![11.0, 12.0, 13.0],
    )
    .unwrap();

    let set = FeatureBuilder::new(2).unwrap().build(&table, &aggregate).unwrap();
    // Kept rows are weeks 2..4; weeks 3 and 4 have no forecast entry
    assert_eq!(set.height(), 3);
    assert_eq!(set.features().column(EXOG_COLUMN).unwrap().null_count(), 2);

    let names = set.feature_names();
    let exog = names.iter().position(|n| n == EXOG_COLUMN).unwrap();
    let matrix = set.feature_matrix().unwrap();
    assert_eq!(matrix[0][exog], 12.0);
    assert!(matrix[1][exog].is_nan());
    assert!(matrix[2][exog].is_nan());
}

#[test]
fn zero_lags_is_a_config_error() {
    assert!(matches!(
        FeatureBuilder::new(0),
        Err(PipelineError::Config(_))
    ));
}

#[test]
fn too_few_rows_for_the_lag_depth_is_a_config_error() {
    let table = cleaned_table(vec![1.0, 2.0, 3.0]);
    let aggregate = full_aggregate(&table);

    assert!(matches!(
        FeatureBuilder::new(3).unwrap().build(&table, &aggregate),
        Err(PipelineError::Config(_))
    ));
}
