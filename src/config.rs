//! Model configuration loaded from `model.yaml`
//!
//! The configuration is read once at startup and handed by reference to the
//! processor, the search and the training job.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};
use crate::pipeline::{Metric, ParamGrid};

/// Key of the churn model inside `models:`.
pub const CHURN_MODEL_KEY: &str = "churn";

/// Root of `model.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub models: BTreeMap<String, ChurnConfig>,

    #[serde(default)]
    pub job: JobConfig,
}

impl ModelConfig {
    /// The `models.churn` section.
    pub fn churn(&self) -> Result<&ChurnConfig> {
        self.models.get(CHURN_MODEL_KEY).ok_or_else(|| {
            ChurnError::Config(format!(
                "missing 'models.{}' section in model configuration",
                CHURN_MODEL_KEY
            ))
        })
    }
}

/// Columns removed before partitioning, one list per feature type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropFeatures {
    #[serde(default)]
    pub numerical: Vec<String>,
    #[serde(default)]
    pub categorical: Vec<String>,
}

/// Settings for the churn classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnConfig {
    /// Name of the binary target column
    pub target: String,

    /// Fraction of rows held out for evaluation by the training job
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the train/test split and the classifier
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    #[serde(default)]
    pub drop_features: DropFeatures,

    #[serde(default)]
    pub param_grid: ParamGrid,

    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    /// Metric that picks the best candidate
    #[serde(default = "default_primary_metric")]
    pub primary_metric: Metric,

    #[serde(default = "default_outlier_factor")]
    pub outlier_factor: f64,

    /// Target value that maps to the positive class when the target is not 0/1
    #[serde(default)]
    pub positive_label: Option<String>,

    /// Worker threads for the search; unset means all cores
    #[serde(default)]
    pub n_jobs: Option<usize>,

    #[serde(default)]
    pub search_timeout_secs: Option<u64>,

    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_seed() -> u64 {
    42
}

fn default_cv_folds() -> usize {
    5
}

fn default_primary_metric() -> Metric {
    Metric::RocAuc
}

fn default_outlier_factor() -> f64 {
    1.5
}

impl ChurnConfig {
    /// Defaults for everything except the target column.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            test_size: default_test_size(),
            random_seed: default_random_seed(),
            drop_features: DropFeatures::default(),
            param_grid: ParamGrid::default(),
            cv_folds: default_cv_folds(),
            primary_metric: default_primary_metric(),
            outlier_factor: default_outlier_factor(),
            positive_label: None,
            n_jobs: None,
            search_timeout_secs: None,
            author: None,
            description: None,
            version: None,
            tags: Vec::new(),
        }
    }

    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown")
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("ML Model")
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("1.0.0")
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(ChurnError::Config("'target' must not be empty".to_string()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ChurnError::Config(format!(
                "'test_size' must be between 0 and 1 (exclusive), got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(ChurnError::Config(format!(
                "'cv_folds' must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(self.outlier_factor >= 0.0) {
            return Err(ChurnError::Config(format!(
                "'outlier_factor' must be non-negative, got {}",
                self.outlier_factor
            )));
        }
        if self.n_jobs == Some(0) {
            return Err(ChurnError::Config(
                "'n_jobs' must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the load -> train -> evaluate job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Extra attempts per step after the first failure
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/churn/data.parquet")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("artifacts/models/churn/model.json")
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    300
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            model_path: default_model_path(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

/// Load and validate `model.yaml`.
///
/// A missing file is reported as [`ChurnError::ConfigNotFound`], YAML that
/// does not parse into the expected shape as [`ChurnError::ConfigParse`]. An
/// empty file is a valid, empty configuration.
pub fn load_model_config(path: &Path) -> Result<ModelConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ChurnError::ConfigNotFound(path.to_path_buf()),
        _ => ChurnError::Io(e),
    })?;

    let config = parse_model_config(&content).map_err(|reason| ChurnError::ConfigParse {
        path: path.to_path_buf(),
        reason,
    })?;

    for churn in config.models.values() {
        churn.validate()?;
    }

    tracing::debug!(path = %path.display(), models = config.models.len(), "Loaded model configuration");
    Ok(config)
}

fn parse_model_config(content: &str) -> std::result::Result<ModelConfig, String> {
    if content.trim().is_empty() {
        return Ok(ModelConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ParamValue;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("model.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
models:
  churn:
    target: churn
    test_size: 0.25
    random_seed: 7
    drop_features:
      numerical: [customer_id]
      categorical: [surname]
    param_grid:
      mlp_classifier__hidden_layer_sizes: [[10], [20]]
    author: Data Team
    tags: [ml, churn]
job:
  retries: 3
  retry_delay_secs: 0
"#,
        );

        let config = load_model_config(&path).unwrap();
        let churn = config.churn().unwrap();
        assert_eq!(churn.target, "churn");
        assert_eq!(churn.test_size, 0.25);
        assert_eq!(churn.random_seed, 7);
        assert_eq!(churn.drop_features.numerical, vec!["customer_id"]);
        assert_eq!(churn.drop_features.categorical, vec!["surname"]);
        assert_eq!(
            churn.param_grid.0["mlp_classifier__hidden_layer_sizes"][1],
            ParamValue::List(vec![ParamValue::Int(20)])
        );
        assert_eq!(churn.author(), "Data Team");
        assert_eq!(churn.description(), "ML Model");
        assert_eq!(churn.cv_folds, 5);
        assert_eq!(churn.primary_metric, Metric::RocAuc);
        assert_eq!(config.job.retries, 3);
        assert_eq!(config.job.model_path, default_model_path());
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "");
        let config = load_model_config(&path).unwrap();
        assert!(config.models.is_empty());
        assert!(config.churn().is_err());
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let result = load_model_config(&dir.path().join("model.yaml"));
        assert!(matches!(result, Err(ChurnError::ConfigNotFound(_))));
    }

    #[test]
    fn test_invalid_yaml_errors() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "invalid: yaml: content:\n  - : missing");
        let result = load_model_config(&path);
        assert!(matches!(result, Err(ChurnError::ConfigParse { .. })));
    }

    #[test]
    fn test_out_of_range_test_size_errors() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "models:\n  churn:\n    target: y\n    test_size: 1.5\n");
        let result = load_model_config(&path);
        assert!(matches!(result, Err(ChurnError::Config(_))));
    }

    #[test]
    fn test_negative_outlier_factor_rejected() {
        let mut config = ChurnConfig::new("churn");
        config.outlier_factor = -1.0;
        assert!(config.validate().is_err());
    }
}
