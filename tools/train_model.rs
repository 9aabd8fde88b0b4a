//! Model Trainer
//!
//! Fits the XGBoost loan eligibility model on the cleaned dataset
//! and writes the model, feature contract and metadata artifacts.

use anyhow::Result;
use clap::Parser;
use loan_eligibility::{config::AppConfig, logging, trainer};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "train-model")]
#[command(about = "Train the loan eligibility model and persist its artifacts")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = loan_eligibility::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Cleaned dataset (overrides data.cleaned_path)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Artifact directory (overrides artifacts.models_dir)
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Random seed for the split and subsampling (overrides training.seed)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_from_path(&cli.config)?;
    logging::init(&config.logging, "train_model")?;

    if let Some(data) = cli.data {
        config.data.cleaned_path = data.to_string_lossy().into_owned();
    }
    if let Some(models_dir) = cli.models_dir {
        config.artifacts.models_dir = models_dir.to_string_lossy().into_owned();
    }
    if let Some(seed) = cli.seed {
        config.training.seed = seed;
    }

    info!(data = %config.data.cleaned_path, "Starting model training");
    let outcome = trainer::run(&config)?;

    info!(
        auc = format!("{:.3}", outcome.metadata.auc),
        accuracy = format!("{:.3}", outcome.metadata.accuracy),
        rounds = config.training.n_estimators,
        "Model and artifacts saved to {}",
        config.artifacts.models_dir
    );

    Ok(())
}
