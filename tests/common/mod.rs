//! Shared test utilities and fixture generators

#![allow(dead_code)]

use churnml::config::ChurnConfig;
use churnml::pipeline::{ParamGrid, ParamValue};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tempfile::TempDir;

const CONTRACTS: [&str; 3] = ["month-to-month", "one-year", "two-year"];

/// Customers whose churn follows a fixed rule, so a small MLP can learn it.
///
/// Columns:
/// - `customer_id`: row id, meant to be dropped through the config
/// - `tenure`: months as a customer (i64)
/// - `monthly_charges`: f64 with every 15th value missing
/// - `contract`: categorical with every 20th value missing
/// - `gender`: categorical noise
/// - `churn`: 1 for short-tenure month-to-month customers and for anyone
///   under a year of tenure
pub fn create_churn_dataframe(rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut customer_id = Vec::with_capacity(rows);
    let mut tenure = Vec::with_capacity(rows);
    let mut monthly_charges = Vec::with_capacity(rows);
    let mut contract = Vec::with_capacity(rows);
    let mut gender = Vec::with_capacity(rows);
    let mut churn = Vec::with_capacity(rows);

    for i in 0..rows {
        let months: i64 = rng.gen_range(1..72);
        let kind = CONTRACTS[rng.gen_range(0..CONTRACTS.len())];
        let charge = 20.0 + rng.gen::<f64>() * 80.0;
        let recorded_contract = (i % 20 != 7).then(|| kind.to_string());

        let churned = months < 12
            || (recorded_contract.as_deref() == Some("month-to-month") && months < 30);

        customer_id.push(i as i64);
        tenure.push(months);
        monthly_charges.push((i % 15 != 4).then_some(charge));
        contract.push(recorded_contract);
        gender.push(if rng.gen_bool(0.5) { "F" } else { "M" });
        churn.push(i32::from(churned));
    }

    df! {
        "customer_id" => customer_id,
        "tenure" => tenure,
        "monthly_charges" => monthly_charges,
        "contract" => contract,
        "gender" => gender,
        "churn" => churn,
    }
    .unwrap()
}

/// Same customers with a "Yes"/"No" target.
pub fn create_labelled_churn_dataframe(rows: usize) -> DataFrame {
    let mut df = create_churn_dataframe(rows);
    let labels: Vec<&str> = df
        .column("churn")
        .unwrap()
        .i32()
        .unwrap()
        .into_no_null_iter()
        .map(|v| if v == 1 { "Yes" } else { "No" })
        .collect();
    df.with_column(Column::new("churn".into(), labels)).unwrap();
    df
}

/// A single small candidate that trains quickly.
pub fn fast_param_grid() -> ParamGrid {
    ParamGrid::new()
        .with(
            "mlp_classifier__hidden_layer_sizes",
            vec![ParamValue::from(vec![16i64])],
        )
        .with("mlp_classifier__learning_rate_init", vec![ParamValue::Float(0.01)])
        .with("mlp_classifier__batch_size", vec![ParamValue::Int(32)])
        .with("mlp_classifier__max_iter", vec![ParamValue::Int(300)])
}

/// Config for the fixture frame: `customer_id` dropped, 3-fold CV.
pub fn fast_config() -> ChurnConfig {
    let mut config = ChurnConfig::new("churn");
    config.drop_features.numerical = vec!["customer_id".to_string()];
    config.param_grid = fast_param_grid();
    config.cv_folds = 3;
    config.n_jobs = Some(2);
    config
}

/// `model.yaml` equivalent of [`fast_config`], with job paths under `dir`.
pub fn fast_config_yaml(data_path: &std::path::Path, model_path: &std::path::Path) -> String {
    format!(
        r#"models:
  churn:
    target: churn
    cv_folds: 3
    n_jobs: 2
    author: Test Team
    tags: [test]
    drop_features:
      numerical: [customer_id]
    param_grid:
      mlp_classifier__hidden_layer_sizes: [[16]]
      mlp_classifier__learning_rate_init: [0.01]
      mlp_classifier__batch_size: [32]
      mlp_classifier__max_iter: [300]
job:
  data_path: {}
  model_path: {}
  retries: 0
  retry_delay_secs: 0
"#,
        data_path.display(),
        model_path.display()
    )
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}
