//! Configuration management for the loan eligibility service and offline tools

use crate::types::prediction::RiskBucketThresholds;
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub decision: DecisionConfig,
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Socket address assembled from host and port
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

/// Locations of the trained artifacts shared by trainer and service
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory holding all model artifacts
    pub models_dir: String,
    /// Serialized booster
    pub model_file: String,
    /// Ordered feature-name list (the feature contract)
    pub features_file: String,
    /// Training metadata record
    pub meta_file: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            model_file: "loan_eligibility_model.bin".to_string(),
            features_file: "feature_columns.json".to_string(),
            meta_file: "model_meta.json".to_string(),
        }
    }
}

impl ArtifactsConfig {
    pub fn model_path(&self) -> PathBuf {
        Path::new(&self.models_dir).join(&self.model_file)
    }

    pub fn features_path(&self) -> PathBuf {
        Path::new(&self.models_dir).join(&self.features_file)
    }

    pub fn meta_path(&self) -> PathBuf {
        Path::new(&self.models_dir).join(&self.meta_file)
    }
}

/// Serving-time decision rules
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Minimum approval probability for `approved = true`
    pub approval_threshold: f64,
    /// Risk bucket cutoffs
    pub risk_buckets: RiskBucketThresholds,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            approval_threshold: 0.60,
            risk_buckets: RiskBucketThresholds::default(),
        }
    }
}

/// Dataset locations for the offline stages
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Raw applicant dataset consumed by the converter
    pub raw_path: String,
    /// Cleaned dataset written by the converter and read by the trainer
    pub cleaned_path: String,
    /// Dataset identifier recorded in the model metadata
    pub dataset_name: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: "data/Loan_Data.csv".to_string(),
            cleaned_path: "data/converted_credit.csv".to_string(),
            dataset_name: "Kaggle Loan Prediction".to_string(),
        }
    }
}

/// Split and booster hyperparameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for validation
    pub test_size: f64,
    /// Seed for the split and for row/column subsampling
    pub seed: u64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Row fraction sampled per tree
    pub subsample: f64,
    /// Column fraction sampled per tree
    pub colsample_bytree: f64,
    /// L2 regularisation on leaf weights
    pub lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            n_estimators: 250,
            max_depth: 4,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample_bytree: 0.9,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific path.
    ///
    /// A missing file leaves the built-in defaults in place. `LOAN__`-prefixed
    /// environment variables override file values.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("LOAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds that cannot describe a probability cutoff
    pub fn validate(&self) -> Result<()> {
        let decision = &self.decision;
        ensure!(
            (0.0..=1.0).contains(&decision.approval_threshold),
            "approval_threshold must be within [0, 1], got {}",
            decision.approval_threshold
        );
        decision.risk_buckets.validate()?;

        let training = &self.training;
        ensure!(
            training.test_size > 0.0 && training.test_size < 1.0,
            "test_size must be within (0, 1), got {}",
            training.test_size
        );
        ensure!(
            training.subsample > 0.0 && training.subsample <= 1.0,
            "subsample must be within (0, 1], got {}",
            training.subsample
        );
        ensure!(
            training.colsample_bytree > 0.0 && training.colsample_bytree <= 1.0,
            "colsample_bytree must be within (0, 1], got {}",
            training.colsample_bytree
        );
        Ok(())
    }
}
