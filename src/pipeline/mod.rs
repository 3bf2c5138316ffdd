//! Pipeline module - the estimator, its search and the metrics it is scored on

pub mod classifier;
pub mod cv;
pub mod metrics;
pub mod model;
pub mod params;
pub mod preprocessing;
pub mod search;

pub use classifier::{Activation, Classifier, MlpClassifier, MlpConfig};
pub use cv::{Fold, StratifiedKFold};
pub use metrics::*;
pub use model::ModelPipeline;
pub use params::{ParamGrid, ParamSet, ParamValue};
pub use preprocessing::{CategoricalBranch, NumericBranch, Preprocessor};
pub use search::{ChurnPipeline, CvResult, GridSearch};
