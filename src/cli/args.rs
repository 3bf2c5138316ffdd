//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// churnml - Train, evaluate and serve predictions from the churn classifier
#[derive(Parser, Debug)]
#[command(name = "churnml")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Model configuration file (YAML)
    #[arg(short, long, global = true, default_value = "model.yaml")]
    pub config: PathBuf,

    /// Log pipeline progress to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the training job: load data, grid-search the model, evaluate and save it
    Train {
        /// Dataset (CSV or Parquet). Defaults to `job.data_path` from the config
        #[arg(short, long, value_parser = validate_dataset_path)]
        data: Option<PathBuf>,

        /// Artifact output path. Defaults to `job.model_path` from the config
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Extra attempts per job step after a failure
        #[arg(long)]
        retries: Option<u32>,

        /// Seconds to wait between attempts
        #[arg(long)]
        retry_delay: Option<u64>,

        /// Hide spinners and the search progress bar
        #[arg(long, default_value = "false")]
        no_progress: bool,
    },

    /// Score a saved model on a labelled dataset
    Evaluate {
        /// Labelled dataset (CSV or Parquet). Defaults to `job.data_path`
        #[arg(short, long, value_parser = validate_dataset_path)]
        data: Option<PathBuf>,

        /// Artifact to evaluate. Defaults to `job.model_path`
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Write the new metrics back into the artifact
        #[arg(long, default_value = "false")]
        save: bool,
    },

    /// Predict churn for every row of a dataset
    Predict {
        /// Rows to score (CSV or Parquet)
        #[arg(short, long, value_parser = validate_dataset_path)]
        input: PathBuf,

        /// Output file (CSV or Parquet). Defaults to `<input>_predictions.<ext>`
        #[arg(short, long, value_parser = validate_dataset_path)]
        output: Option<PathBuf>,

        /// Artifact to predict with. Defaults to `job.model_path`
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Show an artifact's metadata, hyperparameters and metrics
    Inspect {
        /// Artifact to inspect. Defaults to `job.model_path`
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

/// `explicit` if given, the configured job path otherwise.
pub fn resolve_path(explicit: Option<&PathBuf>, configured: &Path) -> PathBuf {
    explicit
        .cloned()
        .unwrap_or_else(|| configured.to_path_buf())
}

/// Derive `<stem>_predictions.<ext>` next to the input.
pub fn predictions_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv");
    parent.join(format!("{}_predictions.{}", stem, extension))
}

/// Validator for dataset paths: CSV or Parquet by extension
fn validate_dataset_path(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("csv") | Some("parquet") => Ok(path),
        Some(other) => Err(format!(
            "unsupported file extension '.{}': expected .csv or .parquet",
            other
        )),
        None => Err(format!(
            "'{}' has no file extension: expected .csv or .parquet",
            s
        )),
    }
}
