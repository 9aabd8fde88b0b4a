//! Type definitions shared by the offline tools and the service

pub mod metadata;
pub mod prediction;

pub use metadata::ModelMetadata;
pub use prediction::{PredictionResult, RiskBucket, RiskBucketThresholds};
