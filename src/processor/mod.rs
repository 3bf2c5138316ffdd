//! Churn processor: train, score, predict and persist the churn model
//!
//! A processor starts [`ProcessorState::Unfit`] and becomes
//! [`ProcessorState::Fitted`] through [`ChurnProcessor::train`] or
//! [`ChurnProcessor::load`]. Every inference operation on an unfit processor
//! fails with [`ChurnError::NotFitted`].

pub mod artifact;

pub use artifact::{Artifact, ArtifactMetadata, FittedChurnModel, ARTIFACT_FORMAT_VERSION};

use std::path::Path;

use ndarray::Array2;
use polars::prelude::*;
use uuid::Uuid;

use crate::config::ChurnConfig;
use crate::data::{FeaturePartition, TargetEncoding};
use crate::error::{ChurnError, Result};
use crate::pipeline::{evaluate, ChurnPipeline, MetricsRecord};

#[derive(Debug, Clone)]
pub enum ProcessorState {
    Unfit,
    Fitted(Box<FittedChurnModel>),
}

#[derive(Debug, Clone)]
pub struct ChurnProcessor {
    config: ChurnConfig,
    state: ProcessorState,
    show_progress: bool,
}

impl ChurnProcessor {
    pub fn new(config: ChurnConfig) -> Self {
        Self {
            config,
            state: ProcessorState::Unfit,
            show_progress: false,
        }
    }

    /// Show a progress bar over search candidates during `train`.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &ChurnConfig {
        &self.config
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, ProcessorState::Fitted(_))
    }

    pub fn model(&self) -> Result<&FittedChurnModel> {
        match &self.state {
            ProcessorState::Fitted(model) => Ok(model.as_ref()),
            ProcessorState::Unfit => Err(ChurnError::NotFitted("ChurnProcessor")),
        }
    }

    /// Fit the search on `x` (features only) and `y` (raw target).
    ///
    /// The processor only becomes fitted when every step succeeds; on error
    /// the previous state is kept.
    pub fn train(&mut self, x: &DataFrame, y: &Series) -> Result<&mut Self> {
        tracing::info!(rows = x.height(), columns = x.width(), "Training process");

        if x.height() == 0 || x.width() == 0 {
            return Err(ChurnError::InvalidShape(format!(
                "training features are empty ({} rows x {} columns)",
                x.height(),
                x.width()
            )));
        }
        if x.column(&self.config.target).is_ok() {
            return Err(ChurnError::InvalidInput(format!(
                "target column '{}' must be removed from the training features",
                self.config.target
            )));
        }
        if y.len() != x.height() {
            return Err(ChurnError::InvalidShape(format!(
                "features have {} rows but target has {}",
                x.height(),
                y.len()
            )));
        }

        let target = TargetEncoding::infer(y, self.config.positive_label.as_deref())?;
        let encoded = target.encode(y)?;
        let partition = FeaturePartition::from_frame(x);

        let mut search = ChurnPipeline::new(
            self.config.param_grid.clone(),
            partition.numeric,
            partition.categorical,
            &self.config,
        )
        .build()
        .with_progress(self.show_progress);
        search.fit(x, &encoded)?;

        let feature_columns = x
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        self.state = ProcessorState::Fitted(Box::new(FittedChurnModel {
            search,
            target,
            feature_columns,
        }));
        Ok(self)
    }

    /// Accuracy, ROC-AUC (on positive class probabilities) and F1 on `x`/`y`.
    pub fn compute_metrics(&self, x: &DataFrame, y: &Series) -> Result<MetricsRecord> {
        let model = self.model()?;
        let y_true = model.target.encode(y)?;
        let (predictions, probabilities) = self.predict(x)?;
        let scores = probabilities.column(1).to_vec();
        evaluate(&y_true, &predictions, &scores)
    }

    /// Hard labels and `[P(0), P(1)]` probabilities, in that order.
    pub fn predict(&self, x: &DataFrame) -> Result<(Vec<u8>, Array2<f64>)> {
        let model = self.model()?;
        let probabilities = model.search.predict_proba(x)?;
        let predictions: Vec<u8> = probabilities
            .column(1)
            .iter()
            .map(|&p| u8::from(p > 0.5))
            .collect();

        tracing::info!("Predictions completed for {} samples", predictions.len());
        Ok((predictions, probabilities))
    }

    /// Write the fitted model and `metrics` to `path`. Returns the new model id.
    pub fn dump(&self, metrics: &MetricsRecord, path: &Path) -> Result<Uuid> {
        let model = self.model()?;
        tracing::info!(path = %path.display(), "Saving model");

        let extra = ArtifactMetadata {
            model_author: self.config.author().to_string(),
            model_description: self.config.description().to_string(),
            model_version: self.config.version().to_string(),
            tags: self.config.tags.clone(),
        };
        let params = model.search.best_params()?.clone();
        let artifact = Artifact::new(model.clone(), params, metrics.clone(), extra);
        artifact.write(path)?;
        Ok(artifact.model_id)
    }

    /// A fitted processor from the artifact at `path`.
    pub fn load(path: &Path, config: ChurnConfig) -> Result<Self> {
        tracing::info!(path = %path.display(), "Loading model");
        let artifact = Artifact::read(path)?;
        if !artifact.model.search.is_fitted() {
            return Err(ChurnError::CorruptArtifact {
                path: path.to_path_buf(),
                reason: "artifact holds no fitted estimator".to_string(),
            });
        }

        Ok(Self {
            config,
            state: ProcessorState::Fitted(Box::new(artifact.model)),
            show_progress: false,
        })
    }
}
