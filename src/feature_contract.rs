//! Feature contract shared by training and serving.
//!
//! The model has no notion of column identity: it only sees positions. The
//! contract pins the ordered feature names at training time, and serving
//! builds every input vector by looking names up in that order.

use crate::error::{ArtifactError, PredictError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Target column of the cleaned dataset
pub const TARGET_COLUMN: &str = "Loan_Status";

/// Canonical feature order used by the loan eligibility model
pub const LOAN_FEATURES: [&str; 11] = [
    "Gender",
    "Married",
    "Dependents",
    "Education",
    "Self_Employed",
    "ApplicantIncome",
    "CoapplicantIncome",
    "LoanAmount",
    "Loan_Amount_Term",
    "Credit_History",
    "Property_Area",
];

/// Ordered list of feature names a trained model expects.
///
/// Serializes as a plain JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureContract {
    names: Vec<String>,
}

impl FeatureContract {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The loan eligibility schema, in training order
    pub fn loan() -> Self {
        Self::new(LOAN_FEATURES)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature in the model input vector
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Build the model input vector from a name/value record.
    ///
    /// Values are looked up by name, so the key order of `record` is
    /// irrelevant. Extra keys are ignored. A missing name is an error; no
    /// default is ever substituted.
    pub fn extract(&self, record: &Map<String, Value>) -> Result<Vec<f64>, PredictError> {
        self.names
            .iter()
            .map(|name| {
                let value = record
                    .get(name)
                    .ok_or_else(|| PredictError::MissingFeature { name: name.clone() })?;
                numeric_value(value).ok_or_else(|| PredictError::InvalidFeature {
                    name: name.clone(),
                    value: value.to_string(),
                })
            })
            .collect()
    }

    /// Fail unless `self` lists exactly the same names in the same order
    pub fn ensure_matches(&self, expected: &FeatureContract) -> Result<(), ArtifactError> {
        if self == expected {
            Ok(())
        } else {
            Err(ArtifactError::ContractMismatch {
                expected: expected.names.clone(),
                found: self.names.clone(),
            })
        }
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Map<String, Value> {
        json!({
            "Gender": 1,
            "Married": 1,
            "Dependents": 0,
            "Education": 1,
            "Self_Employed": 0,
            "ApplicantIncome": 5000,
            "CoapplicantIncome": 0,
            "LoanAmount": 150,
            "Loan_Amount_Term": 360,
            "Credit_History": 1,
            "Property_Area": 2
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_extract_follows_contract_order() {
        let contract = FeatureContract::loan();
        let features = contract.extract(&sample_record()).unwrap();

        assert_eq!(features.len(), contract.len());
        assert_eq!(
            features,
            vec![1.0, 1.0, 0.0, 1.0, 0.0, 5000.0, 0.0, 150.0, 360.0, 1.0, 2.0]
        );
    }

    #[test]
    fn test_extract_ignores_key_order_and_extra_keys() {
        let contract = FeatureContract::loan();

        // Keys written in reverse of contract order, plus an unknown key
        let pairs: Vec<String> = contract
            .names()
            .iter()
            .rev()
            .map(|name| format!("\"{}\":{}", name, sample_record()[name.as_str()]))
            .collect();
        let text = format!("{{\"Loan_ID\":\"LP001002\",{}}}", pairs.join(","));
        let reversed: Map<String, Value> = serde_json::from_str(&text).unwrap();

        assert_eq!(
            contract.extract(&reversed).unwrap(),
            contract.extract(&sample_record()).unwrap()
        );
    }

    #[test]
    fn test_extract_uses_names_not_positions() {
        let contract = FeatureContract::new(["b", "a"]);
        let record: Map<String, Value> = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        assert_eq!(contract.extract(&record).unwrap(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_missing_feature_is_reported() {
        let contract = FeatureContract::loan();
        let mut record = sample_record();
        record.remove("Credit_History");

        let err = contract.extract(&record).unwrap_err();
        assert_eq!(
            err,
            PredictError::MissingFeature {
                name: "Credit_History".to_string()
            }
        );
    }

    #[test]
    fn test_non_numeric_feature_is_rejected() {
        let contract = FeatureContract::loan();
        let mut record = sample_record();
        record.insert("Property_Area".to_string(), json!("Urban"));
        record.insert("Gender".to_string(), Value::Null);

        // First offending name in contract order wins
        let err = contract.extract(&record).unwrap_err();
        assert_eq!(err.feature(), Some("Gender"));
        assert_eq!(err.kind(), "invalid_feature");
    }

    #[test]
    fn test_lenient_scalars() {
        let contract = FeatureContract::new(["a", "b"]);
        let record = json!({"a": true, "b": "42.5"}).as_object().cloned().unwrap();
        assert_eq!(contract.extract(&record).unwrap(), vec![1.0, 42.5]);
    }

    #[test]
    fn test_contract_serializes_as_array() {
        let contract = FeatureContract::loan();
        let json = serde_json::to_string(&contract).unwrap();
        assert!(json.starts_with("[\"Gender\",\"Married\""));

        let parsed: FeatureContract = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, contract);
        assert_eq!(parsed.index_of("Property_Area"), Some(10));
    }

    #[test]
    fn test_ensure_matches_detects_reordering() {
        let mut names: Vec<&str> = LOAN_FEATURES.to_vec();
        names.swap(0, 1);
        let swapped = FeatureContract::new(names);

        assert!(FeatureContract::loan()
            .ensure_matches(&FeatureContract::loan())
            .is_ok());
        assert!(matches!(
            swapped.ensure_matches(&FeatureContract::loan()),
            Err(ArtifactError::ContractMismatch { .. })
        ));
    }
}
