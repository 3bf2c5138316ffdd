//! churnml: churn-prediction CLI
//!
//! Trains the grid-searched churn classifier from a model configuration,
//! scores saved artifacts and writes predictions for new rows.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use churnml::cli::{self, Cli};
use churnml::utils::print_banner;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "churnml=info"
    } else {
        "churnml=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    print_banner(env!("CARGO_PKG_VERSION"));
    cli::run(&cli.command, &cli.config)
}
