//! The composed estimator: preprocessing, optional selection, classifier

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::to_matrix;
use crate::error::{ChurnError, Result};
use crate::pipeline::classifier::{Classifier, MlpClassifier};
use crate::pipeline::params::{ParamSet, ParamValue};
use crate::pipeline::preprocessing::Preprocessor;
use crate::transformers::{FeatureSelector, Transformer};

pub const STEP_PREPROCESSING: &str = "preprocessing";
pub const STEP_FEATURE_SELECTOR: &str = "feature_selector";
pub const STEP_CLASSIFIER: &str = "mlp_classifier";

/// Preprocessing -> (feature selection) -> MLP, fitted and applied in that
/// fixed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPipeline {
    pub preprocessing: Preprocessor,
    pub feature_selector: Option<FeatureSelector>,
    pub mlp_classifier: MlpClassifier,
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> ChurnError {
    ChurnError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ModelPipeline {
    pub fn new(preprocessing: Preprocessor, mlp_classifier: MlpClassifier) -> Self {
        Self {
            preprocessing,
            feature_selector: None,
            mlp_classifier,
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        let mut steps = vec![STEP_PREPROCESSING];
        if self.feature_selector.is_some() {
            steps.push(STEP_FEATURE_SELECTOR);
        }
        steps.push(STEP_CLASSIFIER);
        steps
    }

    /// Apply `<step>__<param>` style hyperparameters.
    ///
    /// `feature_selector__threshold` inserts the selection step. Names that
    /// address no known parameter are rejected.
    pub fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            let mlp = self.mlp_classifier.config_mut();
            match name.as_str() {
                "mlp_classifier__hidden_layer_sizes" => {
                    mlp.hidden_layer_sizes = value
                        .as_usize_list()
                        .ok_or_else(|| invalid(name, value, "expected a list of layer sizes"))?;
                }
                "mlp_classifier__activation" => {
                    let text = value
                        .as_str()
                        .ok_or_else(|| invalid(name, value, "expected relu, logistic or tanh"))?;
                    mlp.activation = text.parse()?;
                }
                "mlp_classifier__alpha" => {
                    mlp.alpha = value
                        .as_f64()
                        .ok_or_else(|| invalid(name, value, "expected a number"))?;
                }
                "mlp_classifier__learning_rate_init" => {
                    mlp.learning_rate_init = value
                        .as_f64()
                        .ok_or_else(|| invalid(name, value, "expected a number"))?;
                }
                "mlp_classifier__max_iter" => {
                    mlp.max_iter = value
                        .as_usize()
                        .ok_or_else(|| invalid(name, value, "expected a non-negative integer"))?;
                }
                "mlp_classifier__batch_size" => {
                    mlp.batch_size = match value {
                        ParamValue::Text(s) if s == "auto" => None,
                        other => Some(other.as_usize().ok_or_else(|| {
                            invalid(name, value, "expected a positive integer or 'auto'")
                        })?),
                    };
                }
                "mlp_classifier__random_state" => {
                    mlp.random_state = value
                        .as_usize()
                        .ok_or_else(|| invalid(name, value, "expected a non-negative integer"))?
                        as u64;
                }
                "preprocessing__numerical__outlier_clipper__factor" => {
                    let factor = value
                        .as_f64()
                        .ok_or_else(|| invalid(name, value, "expected a number"))?;
                    self.preprocessing
                        .numerical
                        .outlier_clipper
                        .set_factor(factor);
                }
                "feature_selector__threshold" => {
                    let threshold = value
                        .as_f64()
                        .ok_or_else(|| invalid(name, value, "expected a number"))?;
                    match self.feature_selector.as_mut() {
                        Some(selector) => selector.set_threshold(threshold),
                        None => self.feature_selector = Some(FeatureSelector::new(threshold)),
                    }
                }
                _ => {
                    return Err(invalid(
                        name,
                        value,
                        "not a parameter of preprocessing, feature_selector or mlp_classifier",
                    ))
                }
            }
        }
        Ok(())
    }

    /// Features reaching the classifier, in column order. Empty before `fit`.
    pub fn feature_names_out(&self) -> Vec<String> {
        match &self.feature_selector {
            Some(selector) => selector
                .selected_features()
                .map(|s| s.to_vec())
                .unwrap_or_default(),
            None => self.preprocessing.output_names(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.mlp_classifier.is_fitted()
    }

    pub fn fit(&mut self, x: &DataFrame, y: &[f64]) -> Result<()> {
        if x.height() != y.len() {
            return Err(ChurnError::InvalidShape(format!(
                "features have {} rows but target has {}",
                x.height(),
                y.len()
            )));
        }

        let mut features = self.preprocessing.fit_transform(x, None)?;
        if let Some(selector) = self.feature_selector.as_mut() {
            features = selector.fit_transform(&features, Some(y))?;
            if features.width() == 0 {
                return Err(ChurnError::InvalidShape(format!(
                    "feature selection with threshold {} kept no columns",
                    selector.threshold()
                )));
            }
        }

        let matrix = to_matrix(&features, x.height())?;
        self.mlp_classifier.fit(&matrix, y)
    }

    fn features(&self, x: &DataFrame) -> Result<Array2<f64>> {
        let mut features = self.preprocessing.transform(x)?;
        if let Some(selector) = &self.feature_selector {
            features = selector.transform(&features)?;
        }
        to_matrix(&features, x.height())
    }

    /// `[P(0), P(1)]` per row.
    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(ChurnError::NotFitted("ModelPipeline"));
        }
        self.mlp_classifier.predict_proba(&self.features(x)?)
    }

    pub fn predict(&self, x: &DataFrame) -> Result<Vec<u8>> {
        if !self.is_fitted() {
            return Err(ChurnError::NotFitted("ModelPipeline"));
        }
        self.mlp_classifier.predict(&self.features(x)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DropFeatures;
    use crate::data::FeaturePartition;

    fn pipeline() -> ModelPipeline {
        let universe = FeaturePartition {
            numeric: vec!["x".into()],
            categorical: vec![],
        };
        ModelPipeline::new(
            Preprocessor::new(&universe, &DropFeatures::default(), 1.5),
            MlpClassifier::default(),
        )
    }

    #[test]
    fn test_step_names() {
        let mut p = pipeline();
        assert_eq!(p.step_names(), vec!["preprocessing", "mlp_classifier"]);

        p.set_params(&ParamSet::new().with("feature_selector__threshold", 0.2))
            .unwrap();
        assert_eq!(
            p.step_names(),
            vec!["preprocessing", "feature_selector", "mlp_classifier"]
        );
    }

    #[test]
    fn test_set_params_routes_values() {
        let mut p = pipeline();
        let params = ParamSet::new()
            .with("mlp_classifier__hidden_layer_sizes", vec![16i64, 8])
            .with("mlp_classifier__activation", "tanh")
            .with("mlp_classifier__alpha", 0.01)
            .with("mlp_classifier__max_iter", 50i64)
            .with("preprocessing__numerical__outlier_clipper__factor", 3.0);
        p.set_params(&params).unwrap();

        let cfg = p.mlp_classifier.config();
        assert_eq!(cfg.hidden_layer_sizes, vec![16, 8]);
        assert_eq!(cfg.activation.to_string(), "tanh");
        assert_eq!(cfg.alpha, 0.01);
        assert_eq!(cfg.max_iter, 50);
        assert_eq!(p.preprocessing.numerical.outlier_clipper.factor(), 3.0);
    }

    #[test]
    fn test_unknown_param_rejected() {
        let mut p = pipeline();
        let result = p.set_params(&ParamSet::new().with("mlp_classifier__momentum", 0.9));
        assert!(matches!(result, Err(ChurnError::InvalidParameter { .. })));
    }

    #[test]
    fn test_wrong_value_type_rejected() {
        let mut p = pipeline();
        let result = p.set_params(&ParamSet::new().with("mlp_classifier__alpha", "high"));
        assert!(matches!(result, Err(ChurnError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let p = pipeline();
        let df = df! { "x" => [1.0f64] }.unwrap();
        assert!(matches!(p.predict(&df), Err(ChurnError::NotFitted(_))));
    }
}
