//! Training and artifact summaries rendered as tables

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{CvResult, Metric, MetricsRecord, ParamSet};
use crate::processor::Artifact;

/// What a training run produced, for the end-of-run report
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub model_id: String,
    pub primary_metric: Metric,
    pub best_score: f64,
    pub best_params: ParamSet,
    pub cv_results: Vec<CvResult>,
    pub metrics: MetricsRecord,
}

fn score_cell(value: f64) -> Cell {
    if value.is_nan() {
        Cell::new("n/a").fg(Color::DarkGrey)
    } else {
        let color = if value >= 0.8 {
            Color::Green
        } else if value >= 0.6 {
            Color::Yellow
        } else {
            Color::Red
        };
        Cell::new(format!("{:.4}", value)).fg(color)
    }
}

fn header(title: &str) {
    println!();
    println!("    {}", style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

/// Metric name -> value
pub fn metrics_table(metrics: &MetricsRecord) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);
    for (name, value) in metrics {
        table.add_row(vec![Cell::new(name), score_cell(*value)]);
    }
    table
}

pub fn params_table(params: &ParamSet) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Hyperparameter").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);
    if params.is_empty() {
        table.add_row(vec![Cell::new("(defaults)"), Cell::new("")]);
    }
    for (name, value) in params.iter() {
        table.add_row(vec![Cell::new(name), Cell::new(value.to_string())]);
    }
    table
}

/// One row per candidate in enumeration order; the rank-1 row is bold.
pub fn cv_results_table(results: &[CvResult]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    let mut columns = vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Params").add_attribute(Attribute::Bold),
    ];
    columns.extend(
        Metric::ALL
            .iter()
            .map(|m| Cell::new(format!("mean {}", m)).add_attribute(Attribute::Bold)),
    );
    columns.push(Cell::new("Fit (s)").add_attribute(Attribute::Bold));
    table.set_header(columns);

    for result in results {
        let mut rank = Cell::new(result.rank);
        if result.rank == 1 {
            rank = rank.fg(Color::Green).add_attribute(Attribute::Bold);
        }
        let mut row = vec![rank, Cell::new(result.params.to_string())];
        row.extend(Metric::ALL.iter().map(|&m| score_cell(result.mean(m))));
        row.push(Cell::new(format!("{:.2}", result.fit_time_secs)));
        table.add_row(row);
    }
    table
}

/// Header fields of a persisted artifact
pub fn artifact_table(artifact: &Artifact) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Field").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    let fitted = &artifact.model;
    let rows = [
        ("Model ID", artifact.model_id.to_string()),
        ("Created", artifact.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Format version", artifact.format_version.to_string()),
        ("Author", artifact.extra.model_author.clone()),
        ("Description", artifact.extra.model_description.clone()),
        ("Version", artifact.extra.model_version.clone()),
        ("Tags", artifact.extra.tags.join(", ")),
        ("Features", fitted.feature_columns.len().to_string()),
        ("Primary metric", fitted.search.primary_metric().to_string()),
        ("Candidates", fitted.search.cv_results().len().to_string()),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }
    table
}

impl TrainingSummary {
    pub fn display(&self) {
        header("📋 TRAINING SUMMARY");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Item").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![Cell::new("🆔 Model ID"), Cell::new(&self.model_id)]);
        table.add_row(vec![
            Cell::new("🔍 Candidates"),
            Cell::new(self.cv_results.len()),
        ]);
        table.add_row(vec![
            Cell::new(format!("🏆 Best CV {}", self.primary_metric)),
            score_cell(self.best_score).add_attribute(Attribute::Bold),
        ]);
        print_indented(&table);

        header("⚙️  BEST HYPERPARAMETERS");
        print_indented(&params_table(&self.best_params));

        if self.cv_results.len() > 1 {
            header("🔁 CROSS-VALIDATION RESULTS");
            print_indented(&cv_results_table(&self.cv_results));
        }

        if !self.metrics.is_empty() {
            header("📊 HELD-OUT METRICS");
            print_indented(&metrics_table(&self.metrics));
        }
    }
}

/// Print an artifact's metadata, chosen parameters and metrics.
pub fn display_artifact(artifact: &Artifact) {
    header("📦 MODEL ARTIFACT");
    print_indented(&artifact_table(artifact));

    header("⚙️  HYPERPARAMETERS");
    print_indented(&params_table(&artifact.params));

    header("📊 METRICS");
    if artifact.metrics.is_empty() {
        println!("    {}", style("No metrics recorded").dim());
    } else {
        print_indented(&metrics_table(&artifact.metrics));
    }
}
