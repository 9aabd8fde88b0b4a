//! Loan eligibility inference engine

use crate::config::{AppConfig, DecisionConfig};
use crate::error::{ArtifactError, PredictError};
use crate::feature_contract::FeatureContract;
use crate::models::loader::ModelLoader;
use crate::models::ProbabilisticClassifier;
use crate::types::metadata::ModelMetadata;
use crate::types::prediction::{PredictionResult, RiskBucketThresholds};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Read-only scoring state built once at startup and shared by every request
pub struct InferenceEngine {
    model: Box<dyn ProbabilisticClassifier>,
    contract: FeatureContract,
    metadata: Option<ModelMetadata>,
    approval_threshold: f64,
    risk_buckets: RiskBucketThresholds,
}

impl InferenceEngine {
    /// Load the configured artifacts and validate them against the loan schema
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::new(&config.artifacts);
        let artifacts = loader
            .load_all(&FeatureContract::loan())
            .context("Failed to load model artifacts")?;

        let engine = Self::from_parts(
            Box::new(artifacts.model),
            artifacts.contract,
            artifacts.metadata,
            &config.decision,
        )?;

        info!(
            features = engine.contract.len(),
            approval_threshold = engine.approval_threshold,
            low_cutoff = engine.risk_buckets.low,
            medium_cutoff = engine.risk_buckets.medium,
            "Inference engine initialized"
        );
        Ok(engine)
    }

    /// Assemble an engine from an already-loaded model
    pub fn from_parts(
        model: Box<dyn ProbabilisticClassifier>,
        contract: FeatureContract,
        metadata: Option<ModelMetadata>,
        decision: &DecisionConfig,
    ) -> Result<Self, ArtifactError> {
        if model.n_features() != contract.len() {
            return Err(ArtifactError::FeatureCountMismatch {
                model: model.n_features(),
                contract: contract.len(),
            });
        }

        Ok(Self {
            model,
            contract,
            metadata,
            approval_threshold: decision.approval_threshold,
            risk_buckets: decision.risk_buckets.clone(),
        })
    }

    pub fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    pub fn approval_threshold(&self) -> f64 {
        self.approval_threshold
    }

    /// Score a name/value record.
    ///
    /// Values are gathered in contract order by name; a missing or
    /// non-numeric feature fails the request.
    pub fn predict(&self, record: &Map<String, Value>) -> Result<PredictionResult, PredictError> {
        let features = self.contract.extract(record)?;
        self.predict_features(&features)
    }

    /// Score a vector already laid out in contract order
    pub fn predict_features(&self, features: &[f64]) -> Result<PredictionResult, PredictError> {
        let probability = self
            .model
            .predict_proba(features)
            .map_err(|e| PredictError::Inference(format!("{:#}", e)))?;
        let result = PredictionResult::from_probability(
            probability,
            self.approval_threshold,
            &self.risk_buckets,
        );

        debug!(
            probability = probability,
            approved = result.approved,
            risk_bucket = ?result.risk_bucket,
            "Prediction complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::RiskBucket;
    use serde_json::json;

    /// Returns a fixed probability regardless of input
    struct ConstantModel {
        probability: f64,
        n_features: usize,
    }

    impl ProbabilisticClassifier for ConstantModel {
        fn n_features(&self) -> usize {
            self.n_features
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<f64> {
            Ok(self.probability)
        }
    }

    /// Returns the first feature, to observe ordering
    struct FirstFeatureModel;

    impl ProbabilisticClassifier for FirstFeatureModel {
        fn n_features(&self) -> usize {
            2
        }

        fn predict_proba(&self, features: &[f64]) -> Result<f64> {
            Ok(features[0])
        }
    }

    fn engine_with(probability: f64) -> InferenceEngine {
        InferenceEngine::from_parts(
            Box::new(ConstantModel {
                probability,
                n_features: 11,
            }),
            FeatureContract::loan(),
            None,
            &DecisionConfig::default(),
        )
        .unwrap()
    }

    fn applicant() -> Map<String, Value> {
        json!({
            "Gender": 1, "Married": 1, "Dependents": 0, "Education": 1,
            "Self_Employed": 0, "ApplicantIncome": 5000, "CoapplicantIncome": 0,
            "LoanAmount": 150, "Loan_Amount_Term": 360, "Credit_History": 1,
            "Property_Area": 2
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_decision_rules() {
        let result = engine_with(0.8123).predict(&applicant()).unwrap();
        assert!(result.approved);
        assert_eq!(result.probability, 0.812);
        assert_eq!(result.risk_bucket, RiskBucket::Low);

        let result = engine_with(0.6).predict(&applicant()).unwrap();
        assert!(result.approved);
        assert_eq!(result.risk_bucket, RiskBucket::Medium);

        let result = engine_with(0.5999).predict(&applicant()).unwrap();
        assert!(!result.approved);
        assert_eq!(result.risk_bucket, RiskBucket::Medium);

        let result = engine_with(0.4999).predict(&applicant()).unwrap();
        assert!(!result.approved);
        assert_eq!(result.risk_bucket, RiskBucket::High);
    }

    #[test]
    fn test_missing_feature_fails_request() {
        let mut record = applicant();
        record.remove("LoanAmount");

        let err = engine_with(0.9).predict(&record).unwrap_err();
        assert_eq!(
            err,
            PredictError::MissingFeature {
                name: "LoanAmount".to_string()
            }
        );
    }

    #[test]
    fn test_features_gathered_by_name() {
        let engine = InferenceEngine::from_parts(
            Box::new(FirstFeatureModel),
            FeatureContract::new(["b", "a"]),
            None,
            &DecisionConfig::default(),
        )
        .unwrap();

        let record = json!({"a": 0.1, "b": 0.9}).as_object().cloned().unwrap();
        assert_eq!(engine.predict(&record).unwrap().probability, 0.9);
    }

    /// Fails every call, like a native model error
    struct FailingModel;

    impl ProbabilisticClassifier for FailingModel {
        fn n_features(&self) -> usize {
            11
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<f64> {
            anyhow::bail!("booster handle released")
        }
    }

    #[test]
    fn test_model_failure_is_reported() {
        let engine = InferenceEngine::from_parts(
            Box::new(FailingModel),
            FeatureContract::loan(),
            None,
            &DecisionConfig::default(),
        )
        .unwrap();

        let err = engine.predict(&applicant()).unwrap_err();
        assert_eq!(err.kind(), "inference_failed");
    }

    #[test]
    fn test_model_width_checked() {
        let result = InferenceEngine::from_parts(
            Box::new(ConstantModel {
                probability: 0.5,
                n_features: 4,
            }),
            FeatureContract::loan(),
            None,
            &DecisionConfig::default(),
        );
        assert!(matches!(
            result,
            Err(ArtifactError::FeatureCountMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_artifacts_fail_startup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.artifacts.models_dir = dir.path().to_string_lossy().into_owned();
        assert!(InferenceEngine::new(&config).is_err());
    }
}
