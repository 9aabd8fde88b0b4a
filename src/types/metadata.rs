//! Training metadata persisted next to the model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata record written by the trainer and reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model family name
    pub model: String,
    /// Dataset identifier
    pub dataset: String,
    /// Target column name
    pub target: String,
    /// Validation ROC AUC
    pub auc: f64,
    /// Validation accuracy at the 0.5 decision threshold
    pub accuracy: f64,
    /// Feature contract the model was trained against
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub n_train: usize,
    #[serde(default)]
    pub n_validation: usize,
    /// Training completion timestamp
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_metadata_deserializes() {
        let json = r#"{
            "model": "XGBoost",
            "dataset": "Kaggle Loan Prediction",
            "target": "Loan_Status",
            "auc": 0.78,
            "accuracy": 0.81
        }"#;

        let meta: ModelMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.target, "Loan_Status");
        assert!(meta.features.is_empty());
        assert!(meta.trained_at.is_none());
    }
}
