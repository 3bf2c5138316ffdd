//! Subcommand implementations

use std::path::Path;

use anyhow::{bail, Context, Result};
use polars::prelude::*;

use crate::cli::args::{predictions_path, resolve_path, Commands};
use crate::config::{load_model_config, ChurnConfig, ModelConfig};
use crate::data::{read_dataset, split_features_target, write_dataset, TargetEncoding};
use crate::job::{RetryPolicy, TrainingJob};
use crate::processor::{Artifact, ChurnProcessor};
use crate::report::{display_artifact, metrics_table};
use crate::utils::{
    create_spinner, finish_with_success, print_completion, print_config, print_info,
    print_step_header, print_success, print_warning,
};

fn load_config(path: &Path) -> Result<(ModelConfig, ChurnConfig)> {
    let config = load_model_config(path)
        .with_context(|| format!("Failed to load model configuration: {}", path.display()))?;
    let churn = config.churn()?.clone();
    Ok((config, churn))
}

/// Dispatch a parsed subcommand.
pub fn run(command: &Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Train {
            data,
            model,
            retries,
            retry_delay,
            no_progress,
        } => {
            let (config, churn) = load_config(config_path)?;
            let data = resolve_path(data.as_ref(), &config.job.data_path);
            let model = resolve_path(model.as_ref(), &config.job.model_path);

            let mut retry = RetryPolicy::from(&config.job);
            if let Some(retries) = retries {
                retry.retries = *retries;
            }
            if let Some(delay) = retry_delay {
                retry.delay = std::time::Duration::from_secs(*delay);
            }

            run_train(churn, config_path, &data, &model, retry, !no_progress)
        }
        Commands::Evaluate { data, model, save } => {
            let (config, churn) = load_config(config_path)?;
            let data = resolve_path(data.as_ref(), &config.job.data_path);
            let model = resolve_path(model.as_ref(), &config.job.model_path);
            run_evaluate(churn, &data, &model, *save)
        }
        Commands::Predict {
            input,
            output,
            model,
        } => {
            let (config, churn) = load_config(config_path)?;
            let model = resolve_path(model.as_ref(), &config.job.model_path);
            let output = output.clone().unwrap_or_else(|| predictions_path(input));
            run_predict(churn, &model, input, &output)
        }
        Commands::Inspect { model } => {
            // The artifact carries its own metadata; a config is only needed
            // for the default path
            let path = match model {
                Some(path) => path.clone(),
                None => load_config(config_path)?.0.job.model_path,
            };
            run_inspect(&path)
        }
    }
}

pub fn run_train(
    config: ChurnConfig,
    config_path: &Path,
    data: &Path,
    model: &Path,
    retry: RetryPolicy,
    show_progress: bool,
) -> Result<()> {
    print_config(config_path, data, model, &config.target);
    print_step_header(1, "Training Job");
    print_info(&format!(
        "{} candidate(s), {}-fold CV, selecting by {}",
        config.param_grid.candidates()?.len(),
        config.cv_folds,
        config.primary_metric
    ));

    let job = TrainingJob::new(config, data, model)
        .with_retry(retry)
        .with_progress(show_progress);
    let ctx = job.run().context("Training job failed")?;

    if let Some(summary) = &ctx.summary {
        summary.display();
    }
    print_success(&format!("Model saved to {}", model.display()));
    print_completion("Training complete!");
    Ok(())
}

pub fn run_evaluate(config: ChurnConfig, data: &Path, model: &Path, save: bool) -> Result<()> {
    print_step_header(1, "Evaluate Model");

    let df = read_dataset(data)
        .with_context(|| format!("Failed to load dataset: {}", data.display()))?;
    let (x, y) = split_features_target(&df, &config.target)?;

    let processor = ChurnProcessor::load(model, config)
        .with_context(|| format!("Failed to load model: {}", model.display()))?;
    let metrics = processor.compute_metrics(&x, &y)?;

    for line in metrics_table(&metrics).to_string().lines() {
        println!("    {}", line);
    }

    if save {
        let model_id = processor.dump(&metrics, model)?;
        print_success(&format!(
            "Metrics saved to {} (model id {})",
            model.display(),
            model_id
        ));
    }
    Ok(())
}

pub fn run_predict(config: ChurnConfig, model: &Path, input: &Path, output: &Path) -> Result<()> {
    print_step_header(1, "Predict");

    let spinner = create_spinner("Scoring rows...");
    let mut df = read_dataset(input)
        .with_context(|| format!("Failed to load dataset: {}", input.display()))?;
    if df.height() == 0 {
        bail!("No rows to score in {}", input.display());
    }
    if df.column(&config.target).is_ok() {
        print_warning(&format!(
            "Ignoring target column '{}' present in the input",
            config.target
        ));
        df = df.drop(&config.target)?;
    }

    let processor = ChurnProcessor::load(model, config)
        .with_context(|| format!("Failed to load model: {}", model.display()))?;
    let (predictions, probabilities) = processor.predict(&df)?;
    finish_with_success(&spinner, &format!("Scored {} rows", predictions.len()));

    let prediction_column = match &processor.model()?.target {
        TargetEncoding::Binary => Column::new(
            "prediction".into(),
            predictions.iter().map(|&p| p as i32).collect::<Vec<_>>(),
        ),
        encoding => Column::new(
            "prediction".into(),
            predictions
                .iter()
                .map(|&p| encoding.decode(p))
                .collect::<Vec<_>>(),
        ),
    };
    let probability_column = Column::new("probability".into(), probabilities.column(1).to_vec());
    df.with_column(prediction_column)?;
    df.with_column(probability_column)?;

    write_dataset(&mut df, output)
        .with_context(|| format!("Failed to write predictions: {}", output.display()))?;
    print_success(&format!("Predictions written to {}", output.display()));
    Ok(())
}

pub fn run_inspect(path: &Path) -> Result<()> {
    let artifact = Artifact::read(path)
        .with_context(|| format!("Failed to read model artifact: {}", path.display()))?;
    display_artifact(&artifact);
    Ok(())
}
