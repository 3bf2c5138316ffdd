//! On-disk model artifact
//!
//! One JSON document per model: a header (id, timestamp, chosen parameters,
//! metrics, descriptive metadata) followed by the fitted model state.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::TargetEncoding;
use crate::error::{ChurnError, Result};
use crate::pipeline::{GridSearch, MetricsRecord, ParamSet};

/// Bumped whenever the layout of [`Artifact`] changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Everything a fitted processor needs to predict again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedChurnModel {
    pub search: GridSearch,
    pub target: TargetEncoding,
    /// Feature columns of the training frame, in order
    pub feature_columns: Vec<String>,
}

/// Descriptive metadata copied from the model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_author: String,
    pub model_description: String,
    pub model_version: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub format_version: u32,
    pub model_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub params: ParamSet,
    #[serde(default)]
    pub metrics: MetricsRecord,
    pub extra: ArtifactMetadata,
    pub model: FittedChurnModel,
}

impl Artifact {
    /// A fresh artifact with a new id and the current time.
    pub fn new(
        model: FittedChurnModel,
        params: ParamSet,
        metrics: MetricsRecord,
        extra: ArtifactMetadata,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            params,
            metrics,
            extra,
            model,
        }
    }

    /// Write to `path`, creating parent directories and replacing any
    /// existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ChurnError::ArtifactNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| ChurnError::CorruptArtifact {
            path: path.to_path_buf(),
            reason,
        };

        let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| corrupt(format!("not a JSON document ({})", e)))?;

        match value.get("format_version").and_then(|v| v.as_u64()) {
            Some(v) if v == u64::from(ARTIFACT_FORMAT_VERSION) => {}
            Some(v) => {
                return Err(corrupt(format!(
                    "unsupported format version {} (expected {})",
                    v, ARTIFACT_FORMAT_VERSION
                )))
            }
            None => return Err(corrupt("missing 'format_version'".to_string())),
        }

        serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = Artifact::read(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ChurnError::ArtifactNotFound(_))));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, "models:\n  churn: [").unwrap();
        assert!(matches!(
            Artifact::read(&path),
            Err(ChurnError::CorruptArtifact { .. })
        ));
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, r#"{"format_version": 99}"#).unwrap();
        match Artifact::read(&path) {
            Err(ChurnError::CorruptArtifact { reason, .. }) => {
                assert!(reason.contains("99"));
            }
            other => panic!("expected CorruptArtifact, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_json_wrong_shape_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, r#"{"format_version": 1, "model_id": "x"}"#).unwrap();
        assert!(matches!(
            Artifact::read(&path),
            Err(ChurnError::CorruptArtifact { .. })
        ));
    }
}
