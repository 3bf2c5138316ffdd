//! Exhaustive cross-validated hyperparameter search
//!
//! [`ChurnPipeline`] assembles the unfit [`ModelPipeline`] template and wraps
//! it in a [`GridSearch`]. Fitting the search scores every grid candidate with
//! stratified k-fold CV, picks the best by the primary metric and refits that
//! candidate on all training rows.
//!
//! Candidates are evaluated in parallel on a dedicated rayon pool. Each one
//! clones its own stages from the template, so the only shared state is the
//! read-only training data.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use ndarray::Array2;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ChurnConfig, DropFeatures};
use crate::data::{take_rows, FeaturePartition};
use crate::error::{ChurnError, Result};
use crate::pipeline::classifier::{MlpClassifier, MlpConfig};
use crate::pipeline::cv::{Fold, StratifiedKFold};
use crate::pipeline::metrics::Metric;
use crate::pipeline::model::ModelPipeline;
use crate::pipeline::params::{ParamGrid, ParamSet};
use crate::pipeline::preprocessing::Preprocessor;
use crate::utils::create_progress_bar;

/// Builder for the churn estimator and its search.
#[derive(Debug, Clone)]
pub struct ChurnPipeline {
    params: ParamGrid,
    features: FeaturePartition,
    drop_features: DropFeatures,
    outlier_factor: f64,
    random_seed: u64,
    cv_folds: usize,
    primary_metric: Metric,
    n_jobs: Option<usize>,
    timeout: Option<Duration>,
}

impl ChurnPipeline {
    /// `numeric` and `categorical` are the feature universes; the config's
    /// drop-lists are removed from them when the preprocessing stage is built.
    pub fn new(
        params: ParamGrid,
        numeric: Vec<String>,
        categorical: Vec<String>,
        config: &ChurnConfig,
    ) -> Self {
        Self {
            params,
            features: FeaturePartition {
                numeric,
                categorical,
            },
            drop_features: config.drop_features.clone(),
            outlier_factor: config.outlier_factor,
            random_seed: config.random_seed,
            cv_folds: config.cv_folds,
            primary_metric: config.primary_metric,
            n_jobs: config.n_jobs,
            timeout: config.search_timeout_secs.map(Duration::from_secs),
        }
    }

    /// The unfit search. Nothing is validated or trained here.
    pub fn build(&self) -> GridSearch {
        let preprocessing =
            Preprocessor::new(&self.features, &self.drop_features, self.outlier_factor);
        let classifier = MlpClassifier::new(MlpConfig {
            random_state: self.random_seed,
            ..MlpConfig::default()
        });

        GridSearch {
            estimator: ModelPipeline::new(preprocessing, classifier),
            param_grid: self.params.clone(),
            cv_folds: self.cv_folds,
            refit: self.primary_metric,
            n_jobs: self.n_jobs,
            timeout: self.timeout,
            show_progress: false,
            cv_results: Vec::new(),
            best_index: None,
            best_estimator: None,
        }
    }
}

/// Cross-validation outcome for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub params: ParamSet,
    /// Per-fold scores keyed by metric name
    #[serde(with = "crate::utils::serde_float::map_vec")]
    pub split_scores: BTreeMap<String, Vec<f64>>,
    /// Mean over folds; NaN when any fold's score was undefined
    #[serde(with = "crate::utils::serde_float::map")]
    pub mean_scores: BTreeMap<String, f64>,
    /// 1 is best by the primary metric; undefined scores rank last
    pub rank: usize,
    pub fit_time_secs: f64,
    /// Set when the candidate could not be fitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CvResult {
    fn failed(params: ParamSet, n_folds: usize, fit_time_secs: f64, err: &ChurnError) -> Self {
        let split_scores: BTreeMap<String, Vec<f64>> = Metric::ALL
            .iter()
            .map(|m| (m.name().to_string(), vec![f64::NAN; n_folds]))
            .collect();
        let mean_scores = Metric::ALL
            .iter()
            .map(|m| (m.name().to_string(), f64::NAN))
            .collect();
        Self {
            params,
            split_scores,
            mean_scores,
            rank: 0,
            fit_time_secs,
            error: Some(err.to_string()),
        }
    }

    pub fn mean(&self, metric: Metric) -> f64 {
        self.mean_scores
            .get(metric.name())
            .copied()
            .unwrap_or(f64::NAN)
    }
}

/// Grid search over a [`ModelPipeline`] template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearch {
    estimator: ModelPipeline,
    param_grid: ParamGrid,
    cv_folds: usize,
    refit: Metric,
    n_jobs: Option<usize>,
    timeout: Option<Duration>,
    #[serde(skip)]
    show_progress: bool,

    cv_results: Vec<CvResult>,
    best_index: Option<usize>,
    best_estimator: Option<ModelPipeline>,
}

impl GridSearch {
    /// Show a progress bar over candidates while fitting.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn param_grid(&self) -> &ParamGrid {
        &self.param_grid
    }

    pub fn primary_metric(&self) -> Metric {
        self.refit
    }

    pub fn is_fitted(&self) -> bool {
        self.best_estimator.is_some()
    }

    pub fn cv_results(&self) -> &[CvResult] {
        &self.cv_results
    }

    pub fn best_estimator(&self) -> Result<&ModelPipeline> {
        self.best_estimator
            .as_ref()
            .ok_or(ChurnError::NotFitted("GridSearch"))
    }

    pub fn best_params(&self) -> Result<&ParamSet> {
        let index = self.best_index.ok_or(ChurnError::NotFitted("GridSearch"))?;
        Ok(&self.cv_results[index].params)
    }

    /// Mean CV score of the best candidate on the primary metric.
    pub fn best_score(&self) -> Result<f64> {
        let index = self.best_index.ok_or(ChurnError::NotFitted("GridSearch"))?;
        Ok(self.cv_results[index].mean(self.refit))
    }

    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        self.best_estimator()?.predict_proba(x)
    }

    pub fn predict(&self, x: &DataFrame) -> Result<Vec<u8>> {
        self.best_estimator()?.predict(x)
    }

    /// Run the search. On error the previous fitted state is kept.
    pub fn fit(&mut self, x: &DataFrame, y: &[f64]) -> Result<&mut Self> {
        if x.height() != y.len() {
            return Err(ChurnError::InvalidShape(format!(
                "features have {} rows but target has {}",
                x.height(),
                y.len()
            )));
        }

        let candidates = self.param_grid.candidates()?;
        // Reject bad names and values before spending time on CV
        let templates = candidates
            .iter()
            .map(|params| {
                let mut pipeline = self.estimator.clone();
                pipeline.set_params(params)?;
                Ok(pipeline)
            })
            .collect::<Result<Vec<_>>>()?;

        let folds = StratifiedKFold::new(self.cv_folds)?.split(y)?;
        let deadline = self.timeout.map(|limit| (Instant::now() + limit, limit));

        tracing::info!(
            candidates = candidates.len(),
            folds = folds.len(),
            metric = %self.refit,
            "Starting grid search"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs.unwrap_or(0))
            .build()
            .map_err(|e| ChurnError::Config(format!("failed to start search workers: {}", e)))?;

        let progress = if self.show_progress {
            create_progress_bar(candidates.len() as u64, "Searching")
        } else {
            ProgressBar::hidden()
        };

        let evaluated: Vec<(Result<CvResult>, f64)> = pool.install(|| {
            templates
                .par_iter()
                .zip(candidates.par_iter())
                .map(|(template, params)| {
                    let start = Instant::now();
                    let result = evaluate_candidate(template, params, x, y, &folds, deadline);
                    progress.inc(1);
                    (result, start.elapsed().as_secs_f64())
                })
                .collect()
        });
        progress.finish_and_clear();
        let mut results = collect_results(evaluated, &candidates, folds.len())?;

        let best = select_best(&results, self.refit);
        assign_ranks(&mut results, self.refit);
        tracing::info!(
            params = %results[best].params,
            score = results[best].mean(self.refit),
            "Best candidate selected"
        );

        check_deadline(deadline)?;
        let mut best_estimator = templates[best].clone();
        best_estimator.fit(x, y)?;

        self.cv_results = results;
        self.best_index = Some(best);
        self.best_estimator = Some(best_estimator);
        Ok(self)
    }
}

/// A candidate that fails to fit scores NaN on every fold and ranks last. The
/// search fails on a timeout, or when no candidate could be fitted.
fn collect_results(
    evaluated: Vec<(Result<CvResult>, f64)>,
    candidates: &[ParamSet],
    n_folds: usize,
) -> Result<Vec<CvResult>> {
    let mut results = Vec::with_capacity(evaluated.len());
    let mut first_error = None;

    for ((outcome, elapsed), params) in evaluated.into_iter().zip(candidates) {
        match outcome {
            Ok(result) => results.push(result),
            Err(err @ ChurnError::SearchTimeout(_)) => return Err(err),
            Err(err) => {
                tracing::warn!(params = %params, error = %err, "Candidate failed to fit");
                results.push(CvResult::failed(params.clone(), n_folds, elapsed, &err));
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) if results.iter().all(|r| r.error.is_some()) => Err(err),
        _ => Ok(results),
    }
}

fn check_deadline(deadline: Option<(Instant, Duration)>) -> Result<()> {
    match deadline {
        Some((at, limit)) if Instant::now() >= at => {
            Err(ChurnError::SearchTimeout(limit.as_secs()))
        }
        _ => Ok(()),
    }
}

fn evaluate_candidate(
    template: &ModelPipeline,
    params: &ParamSet,
    x: &DataFrame,
    y: &[f64],
    folds: &[Fold],
    deadline: Option<(Instant, Duration)>,
) -> Result<CvResult> {
    let start = Instant::now();
    let mut split_scores: BTreeMap<String, Vec<f64>> = Metric::ALL
        .iter()
        .map(|m| (m.name().to_string(), Vec::with_capacity(folds.len())))
        .collect();

    for fold in folds {
        check_deadline(deadline)?;

        let x_train = take_rows(x, &fold.train)?;
        let y_train: Vec<f64> = fold.train.iter().map(|&i| y[i]).collect();
        let x_test = take_rows(x, &fold.test)?;
        let y_test: Vec<f64> = fold.test.iter().map(|&i| y[i]).collect();

        let mut estimator = template.clone();
        estimator.fit(&x_train, &y_train)?;

        let proba = estimator.predict_proba(&x_test)?;
        let scores: Vec<f64> = proba.column(1).to_vec();
        let predictions: Vec<u8> = scores.iter().map(|&p| u8::from(p > 0.5)).collect();

        for metric in Metric::ALL {
            if let Some(values) = split_scores.get_mut(metric.name()) {
                values.push(metric.score(&y_test, &predictions, &scores));
            }
        }
    }

    let mean_scores = split_scores
        .iter()
        .map(|(name, values)| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (name.clone(), mean)
        })
        .collect();

    let result = CvResult {
        params: params.clone(),
        split_scores,
        mean_scores,
        rank: 0,
        fit_time_secs: start.elapsed().as_secs_f64(),
        error: None,
    };
    tracing::debug!(
        params = %result.params,
        accuracy = result.mean(Metric::Accuracy),
        f1 = result.mean(Metric::F1),
        roc_auc = result.mean(Metric::RocAuc),
        "Candidate scored"
    );
    Ok(result)
}

/// Index of the first candidate with the highest defined score. Without one,
/// the first candidate that fitted.
fn select_best(results: &[CvResult], metric: Metric) -> usize {
    let mut best: Option<(usize, f64)> = None;
    for (i, result) in results.iter().enumerate() {
        let score = result.mean(metric);
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
        .or_else(|| results.iter().position(|r| r.error.is_none()))
        .unwrap_or(0)
}

/// Competition ranking on `metric`: ties share the better rank, undefined last.
fn assign_ranks(results: &mut [CvResult], metric: Metric) {
    let scores: Vec<f64> = results.iter().map(|r| r.mean(metric)).collect();
    for (i, result) in results.iter_mut().enumerate() {
        let score = scores[i];
        result.rank = if score.is_nan() {
            1 + scores.iter().filter(|s| !s.is_nan()).count()
        } else {
            1 + scores.iter().filter(|&&s| s > score).count()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(roc: f64) -> CvResult {
        CvResult {
            params: ParamSet::new(),
            split_scores: BTreeMap::new(),
            mean_scores: [("roc_auc".to_string(), roc)].into_iter().collect(),
            rank: 0,
            fit_time_secs: 0.0,
            error: None,
        }
    }

    #[test]
    fn test_select_best_first_of_ties() {
        let results = vec![result(0.7), result(0.9), result(0.9)];
        assert_eq!(select_best(&results, Metric::RocAuc), 1);
    }

    #[test]
    fn test_select_best_skips_nan() {
        let results = vec![result(f64::NAN), result(0.6)];
        assert_eq!(select_best(&results, Metric::RocAuc), 1);

        let all_nan = vec![result(f64::NAN), result(f64::NAN)];
        assert_eq!(select_best(&all_nan, Metric::RocAuc), 0);
    }

    #[test]
    fn test_ranks() {
        let mut results = vec![result(0.7), result(f64::NAN), result(0.9), result(0.7)];
        assign_ranks(&mut results, Metric::RocAuc);
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![2, 4, 1, 2]);
    }

    #[test]
    fn test_failed_candidate_scores_nan() {
        let candidates = vec![ParamSet::new(), ParamSet::new().with("x", 1i64)];
        let evaluated = vec![
            (Ok(result(0.8)), 0.1),
            (Err(ChurnError::InvalidShape("no columns".into())), 0.2),
        ];
        let results = collect_results(evaluated, &candidates, 3).unwrap();

        assert!(results[0].error.is_none());
        assert_eq!(results[1].error.as_deref(), Some("Invalid shape: no columns"));
        assert_eq!(results[1].split_scores["f1"].len(), 3);
        assert!(results[1].mean(Metric::Accuracy).is_nan());
        assert_eq!(results[1].fit_time_secs, 0.2);
    }

    #[test]
    fn test_all_failed_or_timeout_is_an_error() {
        let candidates = vec![ParamSet::new(), ParamSet::new()];
        let all_failed = vec![
            (Err(ChurnError::InvalidShape("a".into())), 0.0),
            (Err(ChurnError::InvalidShape("b".into())), 0.0),
        ];
        assert!(matches!(
            collect_results(all_failed, &candidates, 3),
            Err(ChurnError::InvalidShape(msg)) if msg == "a"
        ));

        let timed_out = vec![
            (Ok(result(0.8)), 0.0),
            (Err(ChurnError::SearchTimeout(5)), 0.0),
        ];
        assert!(matches!(
            collect_results(timed_out, &candidates, 3),
            Err(ChurnError::SearchTimeout(5))
        ));
    }

    #[test]
    fn test_select_best_avoids_failed_candidate() {
        let mut failed = result(f64::NAN);
        failed.error = Some("boom".into());
        let results = vec![failed, result(f64::NAN)];
        assert_eq!(select_best(&results, Metric::RocAuc), 1);
    }

    #[test]
    fn test_elapsed_deadline_times_out() {
        let past = Some((Instant::now(), Duration::from_secs(0)));
        assert!(matches!(
            check_deadline(past),
            Err(ChurnError::SearchTimeout(0))
        ));
        assert!(check_deadline(None).is_ok());
    }

    #[test]
    fn test_build_is_unfit() {
        let config = ChurnConfig::new("churn");
        let search = ChurnPipeline::new(ParamGrid::new(), vec!["a".into()], vec![], &config).build();
        assert!(!search.is_fitted());
        assert!(matches!(
            search.best_params(),
            Err(ChurnError::NotFitted(_))
        ));
    }
}
