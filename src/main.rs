//! Loan Eligibility Service - Main Entry Point
//!
//! Loads the trained model and feature contract once, then serves
//! `/health`, `/predict` and `/model` over HTTP.

use anyhow::Result;
use clap::Parser;
use loan_eligibility::{
    config::AppConfig,
    logging,
    models::inference::InferenceEngine,
    server::{self, AppState},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "loan-eligibility")]
#[command(about = "Serve loan eligibility predictions over HTTP")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = loan_eligibility::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_from_path(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    logging::init(&config.logging, "loan_eligibility")?;
    info!(config = %cli.config.display(), "Starting Loan Eligibility Service");
    info!(
        "Approval threshold: {:.2}, Risk buckets: LOW>={:.2}, MEDIUM>={:.2}",
        config.decision.approval_threshold,
        config.decision.risk_buckets.low,
        config.decision.risk_buckets.medium
    );

    // Missing or mismatched artifacts abort startup
    let engine = InferenceEngine::new(&config)?;
    let state = Arc::new(AppState::new(engine));

    server::serve(&config, state).await
}
