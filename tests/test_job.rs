//! Tests for the load -> train -> evaluate training job

#[path = "common/mod.rs"]
mod common;

use churnml::error::ChurnError;
use churnml::job::{RetryPolicy, TrainingJob};
use churnml::processor::Artifact;
use common::{create_churn_dataframe, create_temp_csv, create_temp_parquet, fast_config};
use std::time::Duration;

#[test]
fn test_job_trains_evaluates_and_saves() {
    let mut df = create_churn_dataframe(120);
    let (dir, csv_path) = create_temp_csv(&mut df);
    let model_path = dir.path().join("artifacts/model.json");

    let ctx = TrainingJob::new(fast_config(), &csv_path, &model_path)
        .run()
        .unwrap();

    let split = ctx.split.as_ref().unwrap();
    assert_eq!(split.x_test.height(), 24);
    assert_eq!(split.x_train.height(), 96);

    let metrics = ctx.metrics.as_ref().unwrap();
    assert!(metrics.contains_key("roc_auc_score"));

    // the artifact on disk carries the held-out metrics
    let artifact = Artifact::read(&model_path).unwrap();
    assert_eq!(&artifact.metrics, metrics);
    let summary = ctx.summary.as_ref().unwrap();
    assert_eq!(summary.model_id, artifact.model_id.to_string());
    assert_eq!(summary.cv_results.len(), 1);
}

#[test]
fn test_job_reads_parquet() {
    let mut df = create_churn_dataframe(90);
    let (dir, parquet_path) = create_temp_parquet(&mut df);
    let model_path = dir.path().join("model.json");

    let ctx = TrainingJob::new(fast_config(), &parquet_path, &model_path)
        .run()
        .unwrap();
    assert!(ctx.metrics.is_some());
    assert!(model_path.exists());
}

#[test]
fn test_job_missing_dataset_fails_after_retries() {
    let dir = tempfile::TempDir::new().unwrap();
    let job = TrainingJob::new(
        fast_config(),
        &dir.path().join("absent.csv"),
        &dir.path().join("model.json"),
    )
    .with_retry(RetryPolicy {
        retries: 2,
        delay: Duration::ZERO,
    });

    assert!(matches!(job.run(), Err(ChurnError::Io(_))));
    assert!(!dir.path().join("model.json").exists());
}

#[test]
fn test_job_missing_target_column() {
    let mut df = create_churn_dataframe(30).drop("churn").unwrap();
    let (dir, csv_path) = create_temp_csv(&mut df);
    let job = TrainingJob::new(fast_config(), &csv_path, &dir.path().join("model.json"));
    assert!(matches!(job.run(), Err(ChurnError::FeatureNotFound(_))));
}
