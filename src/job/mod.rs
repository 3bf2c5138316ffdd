//! The training job: load data, train, evaluate
//!
//! Steps run in a fixed order and hand their outputs to the next step through
//! a [`JobContext`]. Each step is retried according to the [`RetryPolicy`];
//! the job fails with the last error once a step runs out of attempts.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::{ChurnConfig, JobConfig};
use crate::data::{read_dataset, split_features_target, train_test_split, TrainTestSplit};
use crate::error::{ChurnError, Result};
use crate::pipeline::MetricsRecord;
use crate::processor::ChurnProcessor;
use crate::report::TrainingSummary;
use crate::utils::{create_spinner, finish_with_success, finish_with_warning};

/// Attempts per step: one run plus `retries` more, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Run `op`, retrying on any error.
    pub fn run<T>(&self, step: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        step,
                        attempt,
                        retries = self.retries,
                        error = %e,
                        "Step failed, retrying in {:?}",
                        self.delay
                    );
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                }
                Err(e) => {
                    tracing::error!(step, error = %e, "Step failed, no retries left");
                    return Err(e);
                }
            }
        }
    }
}

impl From<&JobConfig> for RetryPolicy {
    fn from(config: &JobConfig) -> Self {
        Self {
            retries: config.retries,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Values passed between steps
#[derive(Debug, Default)]
pub struct JobContext {
    pub split: Option<TrainTestSplit>,
    pub metrics: Option<MetricsRecord>,
    pub summary: Option<TrainingSummary>,
}

impl JobContext {
    fn split(&self) -> Result<&TrainTestSplit> {
        self.split
            .as_ref()
            .ok_or_else(|| ChurnError::InvalidInput("load_data has not produced a split".to_string()))
    }
}

/// Load -> train -> evaluate over one dataset and artifact path.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    config: ChurnConfig,
    data_path: PathBuf,
    model_path: PathBuf,
    retry: RetryPolicy,
    show_progress: bool,
}

impl TrainingJob {
    pub fn new(config: ChurnConfig, data_path: &Path, model_path: &Path) -> Self {
        Self {
            config,
            data_path: data_path.to_path_buf(),
            model_path: model_path.to_path_buf(),
            retry: RetryPolicy::none(),
            show_progress: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Show spinners per step and the search progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Run every step in order.
    pub fn run(&self) -> Result<JobContext> {
        let mut ctx = JobContext::default();
        self.step("load_data", &mut ctx, Self::load_data)?;
        self.step("train_model", &mut ctx, Self::train_model)?;
        self.step("evaluate_model", &mut ctx, Self::evaluate_model)?;
        Ok(ctx)
    }

    fn step(
        &self,
        name: &str,
        ctx: &mut JobContext,
        op: fn(&Self, &mut JobContext) -> Result<()>,
    ) -> Result<()> {
        tracing::info!(step = name, "Starting step");
        let spinner = self
            .show_progress
            .then(|| create_spinner(&format!("Running {}...", name)));

        let result = self.retry.run(name, || op(self, ctx));
        if let Some(pb) = spinner {
            match &result {
                Ok(()) => finish_with_success(&pb, &format!("{} done", name)),
                Err(_) => finish_with_warning(&pb, &format!("{} failed", name)),
            }
        }
        result
    }

    /// Read the dataset, separate the target and hold out the test split.
    pub fn load_data(&self, ctx: &mut JobContext) -> Result<()> {
        let df = read_dataset(&self.data_path)?;
        let (x, y) = split_features_target(&df, &self.config.target)?;
        let split = train_test_split(&x, &y, self.config.test_size, self.config.random_seed)?;

        tracing::info!(
            train_rows = split.x_train.height(),
            test_rows = split.x_test.height(),
            "Dataset split"
        );
        ctx.split = Some(split);
        Ok(())
    }

    /// Train on the training split and write the artifact without metrics.
    pub fn train_model(&self, ctx: &mut JobContext) -> Result<()> {
        let split = ctx.split()?;
        let mut processor =
            ChurnProcessor::new(self.config.clone()).with_progress(self.show_progress);
        processor.train(&split.x_train, &split.y_train)?;
        processor.dump(&MetricsRecord::new(), &self.model_path)?;
        Ok(())
    }

    /// Reload the artifact, score it on the test split and write it again
    /// with the metrics attached.
    pub fn evaluate_model(&self, ctx: &mut JobContext) -> Result<()> {
        let split = ctx.split()?;
        let processor = ChurnProcessor::load(&self.model_path, self.config.clone())?;
        let metrics = processor.compute_metrics(&split.x_test, &split.y_test)?;
        let model_id = processor.dump(&metrics, &self.model_path)?;

        let search = &processor.model()?.search;
        tracing::info!(model_id = %model_id, ?metrics, "Model evaluated");
        ctx.summary = Some(TrainingSummary {
            model_id: model_id.to_string(),
            primary_metric: search.primary_metric(),
            best_score: search.best_score()?,
            best_params: search.best_params()?.clone(),
            cv_results: search.cv_results().to_vec(),
            metrics: metrics.clone(),
        });
        ctx.metrics = Some(metrics);
        Ok(())
    }
}
