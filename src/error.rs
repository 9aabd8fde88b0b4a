//! Typed errors at the artifact and request boundaries

use std::path::PathBuf;
use thiserror::Error;

/// Client-side failures while turning a request record into a feature vector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error("missing required feature `{name}`")]
    MissingFeature { name: String },

    #[error("feature `{name}` must be numeric, got {value}")]
    InvalidFeature { name: String, value: String },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("model failed to score the request: {0}")]
    Inference(String),
}

impl PredictError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::MissingFeature { .. } => "missing_feature",
            PredictError::InvalidFeature { .. } => "invalid_feature",
            PredictError::MalformedBody(_) => "malformed_body",
            PredictError::Inference(_) => "inference_failed",
        }
    }

    /// Offending feature name, if the error concerns one
    pub fn feature(&self) -> Option<&str> {
        match self {
            PredictError::MissingFeature { name } | PredictError::InvalidFeature { name, .. } => {
                Some(name)
            }
            PredictError::MalformedBody(_) | PredictError::Inference(_) => None,
        }
    }
}

/// Failures reading, writing or validating persisted artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid model {}: {reason}", path.display())]
    InvalidModel { path: PathBuf, reason: String },

    #[error("failed to save model {}: {reason}", path.display())]
    SaveModel { path: PathBuf, reason: String },

    #[error("feature contract mismatch: expected {expected:?}, found {found:?}")]
    ContractMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("model expects {model} features but the contract lists {contract}")]
    FeatureCountMismatch { model: usize, contract: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_error_kinds() {
        let missing = PredictError::MissingFeature {
            name: "LoanAmount".to_string(),
        };
        assert_eq!(missing.kind(), "missing_feature");
        assert_eq!(missing.feature(), Some("LoanAmount"));
        assert_eq!(missing.to_string(), "missing required feature `LoanAmount`");

        let malformed = PredictError::MalformedBody("expected object".to_string());
        assert_eq!(malformed.kind(), "malformed_body");
        assert_eq!(malformed.feature(), None);
    }
}
