//! Loan Eligibility Library
//!
//! Offline dataset conversion and XGBoost training, plus the online
//! inference service that scores applicants against the trained model.

pub mod config;
pub mod converter;
pub mod error;
pub mod evaluation;
pub mod feature_contract;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod server;
pub mod trainer;
pub mod types;

pub use config::AppConfig;
pub use error::{ArtifactError, PredictError};
pub use feature_contract::FeatureContract;
pub use models::inference::InferenceEngine;
pub use types::{ModelMetadata, PredictionResult, RiskBucket};
