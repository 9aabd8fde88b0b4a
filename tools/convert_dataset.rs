//! Dataset Converter
//!
//! Cleans the raw loan dataset: drops the identifier, imputes missing
//! values and encodes categories as integers.

use anyhow::Result;
use clap::Parser;
use loan_eligibility::{config::AppConfig, converter, logging};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "convert-dataset")]
#[command(about = "Clean the raw loan dataset into an all-numeric CSV")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = loan_eligibility::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Raw dataset (overrides data.raw_path)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Cleaned dataset (overrides data.cleaned_path)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_path(&cli.config)?;
    logging::init(&config.logging, "convert_dataset")?;

    let input = cli.input.unwrap_or_else(|| PathBuf::from(&config.data.raw_path));
    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&config.data.cleaned_path));

    info!(input = %input.display(), "Converting dataset");
    let summary = converter::convert_file(&input, &output)?;

    for (column, (value, filled)) in &summary.imputed {
        info!(column = %column, value = %value, filled, "Imputed missing values");
    }
    info!(
        rows = summary.rows,
        columns = ?summary.columns,
        "Dataset cleaned and saved to {}",
        output.display()
    );

    Ok(())
}
