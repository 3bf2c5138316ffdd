//! Multi-layer perceptron for binary classification
//!
//! A feed-forward network with a single logistic output unit, trained on
//! binary cross-entropy plus an L2 penalty using Adam over shuffled
//! mini-batches. Training stops early once the epoch loss stops improving.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const EPSILON: f64 = 1e-8;
/// Default cap on the mini-batch size
const MAX_AUTO_BATCH: usize = 200;
/// Probabilities are clipped this far from 0 and 1 before taking logs
const PROBA_CLIP: f64 = 1e-15;

/// A fitted binary classifier over dense features.
pub trait Classifier {
    /// Fit on `x` (one row per sample) and a 0/1 target.
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()>;

    /// Class probabilities, one row per sample: `[P(0), P(1)]`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Hard labels, thresholding `P(1)` at 0.5.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .column(1)
            .iter()
            .map(|&p| u8::from(p > 0.5))
            .collect())
    }
}

/// Hidden layer activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Logistic,
    Tanh,
}

impl Activation {
    fn apply(&self, z: &mut Array2<f64>) {
        match self {
            Activation::Relu => z.mapv_inplace(|v| v.max(0.0)),
            Activation::Logistic => z.mapv_inplace(sigmoid),
            Activation::Tanh => z.mapv_inplace(f64::tanh),
        }
    }

    /// Derivative expressed in terms of the activation output.
    fn derivative(&self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Logistic => a.mapv(|v| v * (1.0 - v)),
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
        }
    }

    /// Glorot uniform scale factor.
    fn init_factor(&self) -> f64 {
        match self {
            Activation::Logistic => 2.0,
            _ => 6.0,
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Relu => "relu",
            Activation::Logistic => "logistic",
            Activation::Tanh => "tanh",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Activation {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "logistic" | "sigmoid" => Ok(Activation::Logistic),
            "tanh" => Ok(Activation::Tanh),
            _ => Err(ChurnError::InvalidParameter {
                name: "activation".to_string(),
                value: s.to_string(),
                reason: "expected one of relu, logistic, tanh".to_string(),
            }),
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// MLP hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    pub hidden_layer_sizes: Vec<usize>,
    pub activation: Activation,
    /// L2 penalty
    pub alpha: f64,
    pub learning_rate_init: f64,
    /// Maximum number of epochs
    pub max_iter: usize,
    /// Mini-batch size; `None` uses `min(200, n_samples)`
    pub batch_size: Option<usize>,
    pub random_state: u64,
    pub tol: f64,
    pub n_iter_no_change: usize,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            activation: Activation::Relu,
            alpha: 1e-4,
            learning_rate_init: 1e-3,
            max_iter: 200,
            batch_size: None,
            random_state: 42,
            tol: 1e-4,
            n_iter_no_change: 10,
        }
    }
}

impl MlpConfig {
    fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| ChurnError::InvalidParameter {
            name: format!("mlp_classifier__{}", name),
            value,
            reason: reason.to_string(),
        };

        if self.hidden_layer_sizes.iter().any(|&s| s == 0) {
            return Err(invalid(
                "hidden_layer_sizes",
                format!("{:?}", self.hidden_layer_sizes),
                "every layer needs at least one unit",
            ));
        }
        if !(self.alpha >= 0.0) {
            return Err(invalid("alpha", self.alpha.to_string(), "must be non-negative"));
        }
        if !(self.learning_rate_init > 0.0) {
            return Err(invalid(
                "learning_rate_init",
                self.learning_rate_init.to_string(),
                "must be positive",
            ));
        }
        if self.max_iter == 0 {
            return Err(invalid("max_iter", "0".to_string(), "must be at least 1"));
        }
        if self.batch_size == Some(0) {
            return Err(invalid("batch_size", "0".to_string(), "must be at least 1"));
        }
        Ok(())
    }
}

/// First and second moment estimates for one parameter tensor
#[derive(Debug, Clone)]
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    fn step(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>, lr_t: f64) {
        Zip::from(param)
            .and(grad)
            .and(&mut self.m)
            .and(&mut self.v)
            .for_each(|p, &g, m, v| {
                *m = BETA_1 * *m + (1.0 - BETA_1) * g;
                *v = BETA_2 * *v + (1.0 - BETA_2) * g * g;
                *p -= lr_t * *m / (v.sqrt() + EPSILON);
            });
    }
}

/// MLP classifier with one sigmoid output unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    config: MlpConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: Option<usize>,
    n_iter: usize,
    loss_curve: Vec<f64>,
}

impl Default for MlpClassifier {
    fn default() -> Self {
        Self::new(MlpConfig::default())
    }
}

impl MlpClassifier {
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: None,
            n_iter: 0,
            loss_curve: Vec::new(),
        }
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Mutable hyperparameters. Changing them does not reset learned weights
    /// until the next `fit`.
    pub fn config_mut(&mut self) -> &mut MlpConfig {
        &mut self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Epochs run by the last `fit`
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    fn initialize(&mut self, n_features: usize, rng: &mut ChaCha8Rng) {
        let mut sizes = vec![n_features];
        sizes.extend(&self.config.hidden_layer_sizes);
        sizes.push(1);

        let factor = self.config.activation.init_factor();
        self.weights.clear();
        self.biases.clear();
        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = (factor / (fan_in + fan_out) as f64).sqrt();
            self.weights.push(Array2::from_shape_fn((fan_in, fan_out), |_| {
                rng.gen_range(-bound..bound)
            }));
            self.biases.push(Array1::from_shape_fn(fan_out, |_| {
                rng.gen_range(-bound..bound)
            }));
        }
    }

    /// Layer outputs, input first and output probabilities last.
    fn forward(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(self.weights.len() + 1);
        activations.push(x.clone());

        let last = self.weights.len() - 1;
        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let mut z = activations[i].dot(w) + b;
            if i == last {
                z.mapv_inplace(sigmoid);
            } else {
                self.config.activation.apply(&mut z);
            }
            activations.push(z);
        }
        activations
    }

    /// Batch loss and gradients for every layer.
    fn backward(
        &self,
        activations: &[Array2<f64>],
        y: &Array2<f64>,
    ) -> (f64, Vec<(Array2<f64>, Array1<f64>)>) {
        let n = y.nrows() as f64;
        let output = &activations[activations.len() - 1];

        let bce = Zip::from(output)
            .and(y)
            .fold(0.0, |acc, &p, &t| {
                let p = p.clamp(PROBA_CLIP, 1.0 - PROBA_CLIP);
                acc - (t * p.ln() + (1.0 - t) * (1.0 - p).ln())
            })
            / n;
        let penalty: f64 = self.weights.iter().map(|w| w.mapv(|v| v * v).sum()).sum();
        let loss = bce + 0.5 * self.config.alpha * penalty / n;

        let mut grads = Vec::with_capacity(self.weights.len());
        let mut delta = (output - y) / n;
        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.weights[i] * (self.config.alpha / n);
            let grad_b = delta.sum_axis(Axis(0));
            if i > 0 {
                delta = delta.dot(&self.weights[i].t())
                    * self.config.activation.derivative(&activations[i]);
            }
            grads.push((grad_w, grad_b));
        }
        grads.reverse();
        (loss, grads)
    }
}

impl Classifier for MlpClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        self.config.validate()?;

        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(ChurnError::InvalidShape(format!(
                "MlpClassifier needs at least one row and one column, got {}x{}",
                n_samples, n_features
            )));
        }
        if y.len() != n_samples {
            return Err(ChurnError::InvalidShape(format!(
                "MlpClassifier got {} rows but {} target values",
                n_samples,
                y.len()
            )));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(ChurnError::InvalidInput(
                "MlpClassifier target must contain only 0/1 values".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        self.initialize(n_features, &mut rng);
        self.n_features = None;
        self.loss_curve.clear();

        let y = Array2::from_shape_fn((n_samples, 1), |(i, _)| y[i]);
        let batch_size = self
            .config
            .batch_size
            .unwrap_or(MAX_AUTO_BATCH)
            .clamp(1, n_samples);

        let mut moments_w: Vec<_> = self.weights.iter().map(Moments::zeros_like).collect();
        let mut moments_b: Vec<_> = self.biases.iter().map(Moments::zeros_like).collect();
        let mut t = 0i32;

        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut indices: Vec<usize> = (0..n_samples).collect();

        self.n_iter = 0;
        for epoch in 0..self.config.max_iter {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in indices.chunks(batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch = y.select(Axis(0), batch);

                let activations = self.forward(&x_batch);
                let (loss, grads) = self.backward(&activations, &y_batch);
                epoch_loss += loss * batch.len() as f64;

                t += 1;
                let lr_t = self.config.learning_rate_init * (1.0 - BETA_2.powi(t)).sqrt()
                    / (1.0 - BETA_1.powi(t));
                for (i, (grad_w, grad_b)) in grads.iter().enumerate() {
                    moments_w[i].step(&mut self.weights[i], grad_w, lr_t);
                    moments_b[i].step(&mut self.biases[i], grad_b, lr_t);
                }
            }

            let epoch_loss = epoch_loss / n_samples as f64;
            self.loss_curve.push(epoch_loss);
            self.n_iter = epoch + 1;

            if epoch_loss > best_loss - self.config.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }
            if no_improvement >= self.config.n_iter_no_change {
                tracing::debug!(epoch = self.n_iter, loss = epoch_loss, "MLP converged");
                break;
            }
        }

        if self.n_iter == self.config.max_iter && no_improvement < self.config.n_iter_no_change {
            tracing::debug!(
                max_iter = self.config.max_iter,
                "MLP reached max_iter before the loss converged"
            );
        }

        // Diverged weights cannot be scored or persisted
        let finite = self.weights.iter().all(|w| w.iter().all(|v| v.is_finite()))
            && self.biases.iter().all(|b| b.iter().all(|v| v.is_finite()))
            && self.loss_curve.iter().all(|l| l.is_finite());
        if !finite {
            return Err(ChurnError::InvalidInput(format!(
                "MlpClassifier training diverged after {} epochs; check for non-finite \
                 features or lower learning_rate_init",
                self.n_iter
            )));
        }

        self.n_features = Some(n_features);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n_features = self.n_features.ok_or(ChurnError::NotFitted("MlpClassifier"))?;
        if x.ncols() != n_features {
            return Err(ChurnError::InvalidShape(format!(
                "MlpClassifier was fitted on {} features, got {}",
                n_features,
                x.ncols()
            )));
        }

        let activations = self.forward(x);
        let p1 = &activations[activations.len() - 1];
        Ok(Array2::from_shape_fn((x.nrows(), 2), |(i, j)| {
            if j == 1 {
                p1[(i, 0)]
            } else {
                1.0 - p1[(i, 0)]
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<f64>) {
        let x = array![
            [-2.0, -1.0],
            [-1.5, -2.0],
            [-1.0, -1.5],
            [-2.5, -0.5],
            [1.0, 1.5],
            [2.0, 1.0],
            [1.5, 2.5],
            [2.5, 2.0],
        ];
        let y = vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    fn small_config() -> MlpConfig {
        MlpConfig {
            hidden_layer_sizes: vec![8],
            learning_rate_init: 0.05,
            max_iter: 300,
            ..MlpConfig::default()
        }
    }

    #[test]
    fn test_learns_separable_data() {
        let (x, y) = separable();
        let mut clf = MlpClassifier::new(small_config());
        clf.fit(&x, &y).unwrap();

        let pred = clf.predict(&x).unwrap();
        assert_eq!(pred, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = separable();
        let mut clf = MlpClassifier::new(small_config());
        clf.fit(&x, &y).unwrap();

        let proba = clf.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[8, 2]);
        for row in proba.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&row[1]));
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = separable();
        let mut a = MlpClassifier::new(small_config());
        let mut b = MlpClassifier::new(small_config());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_loss_decreases() {
        let (x, y) = separable();
        let mut clf = MlpClassifier::new(small_config());
        clf.fit(&x, &y).unwrap();
        let curve = clf.loss_curve();
        assert!(curve.last().unwrap() < curve.first().unwrap());
        assert_eq!(curve.len(), clf.n_iter());
    }

    #[test]
    fn test_predict_before_fit() {
        let clf = MlpClassifier::default();
        let x = Array2::zeros((1, 2));
        assert!(matches!(clf.predict(&x), Err(ChurnError::NotFitted(_))));
    }

    #[test]
    fn test_feature_count_checked() {
        let (x, y) = separable();
        let mut clf = MlpClassifier::new(small_config());
        clf.fit(&x, &y).unwrap();
        let wrong = Array2::zeros((2, 3));
        assert!(matches!(clf.predict_proba(&wrong), Err(ChurnError::InvalidShape(_))));
    }

    #[test]
    fn test_invalid_hyperparameters() {
        let (x, y) = separable();
        let mut clf = MlpClassifier::new(MlpConfig {
            learning_rate_init: 0.0,
            ..MlpConfig::default()
        });
        assert!(matches!(clf.fit(&x, &y), Err(ChurnError::InvalidParameter { .. })));
    }

    #[test]
    fn test_activation_from_str() {
        assert_eq!("tanh".parse::<Activation>().unwrap(), Activation::Tanh);
        assert_eq!("Logistic".parse::<Activation>().unwrap(), Activation::Logistic);
        assert!("softmax".parse::<Activation>().is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_weights() {
        let (x, y) = separable();
        let mut clf = MlpClassifier::new(small_config());
        clf.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&clf).unwrap();
        let restored: MlpClassifier = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), clf.predict(&x).unwrap());
    }

    #[test]
    fn test_diverged_training_is_rejected() {
        let (mut x, y) = separable();
        x[[3, 0]] = f64::NAN;
        let mut clf = MlpClassifier::new(small_config());

        assert!(matches!(clf.fit(&x, &y), Err(ChurnError::InvalidInput(_))));
        assert!(!clf.is_fitted());
        assert!(matches!(
            clf.predict(&x),
            Err(ChurnError::NotFitted(_))
        ));
    }
}
