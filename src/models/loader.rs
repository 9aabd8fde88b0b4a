//! Artifact persistence: XGBoost model file, feature contract and metadata

use crate::config::ArtifactsConfig;
use crate::error::ArtifactError;
use crate::feature_contract::FeatureContract;
use crate::models::booster::GradientBoostedClassifier;
use crate::types::metadata::ModelMetadata;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything the service needs from a training run
#[derive(Debug)]
pub struct ModelArtifacts {
    pub model: GradientBoostedClassifier,
    pub contract: FeatureContract,
    /// Absent when the metadata file is missing or unreadable
    pub metadata: Option<ModelMetadata>,
}

/// Reads and writes the artifacts under a models directory
#[derive(Debug, Clone)]
pub struct ModelLoader {
    model_path: PathBuf,
    features_path: PathBuf,
    meta_path: PathBuf,
}

impl ModelLoader {
    /// Create a loader for the configured artifact locations
    pub fn new(config: &ArtifactsConfig) -> Self {
        Self {
            model_path: config.model_path(),
            features_path: config.features_path(),
            meta_path: config.meta_path(),
        }
    }

    /// Create a loader using the default file names inside `models_dir`
    pub fn in_dir<P: AsRef<Path>>(models_dir: P) -> Self {
        Self::new(&ArtifactsConfig {
            models_dir: models_dir.as_ref().to_string_lossy().into_owned(),
            ..ArtifactsConfig::default()
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn features_path(&self) -> &Path {
        &self.features_path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    /// Load and sanity-check the booster; a broken file is an error here,
    /// never at request time
    pub fn load_model(&self) -> Result<GradientBoostedClassifier, ArtifactError> {
        info!(path = %self.model_path.display(), "Loading model");
        std::fs::metadata(&self.model_path).map_err(|source| ArtifactError::Read {
            path: self.model_path.clone(),
            source,
        })?;
        let model = GradientBoostedClassifier::load(&self.model_path).map_err(|e| {
            ArtifactError::InvalidModel {
                path: self.model_path.clone(),
                reason: format!("{:#}", e),
            }
        })?;
        info!(features = model.n_features(), "Model loaded successfully");
        Ok(model)
    }

    pub fn load_contract(&self) -> Result<FeatureContract, ArtifactError> {
        let contract: FeatureContract = read_json(&self.features_path)?;
        info!(
            path = %self.features_path.display(),
            features = contract.len(),
            "Feature contract loaded"
        );
        Ok(contract)
    }

    /// Metadata is informational; failures are logged and yield `None`
    pub fn load_metadata(&self) -> Option<ModelMetadata> {
        match read_json(&self.meta_path) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(error = %e, "Model metadata unavailable");
                None
            }
        }
    }

    /// Load all artifacts and check them against the expected schema.
    ///
    /// The stored feature list must equal `expected` name for name and in
    /// order, and the model must have been fitted on that many features.
    pub fn load_all(&self, expected: &FeatureContract) -> Result<ModelArtifacts, ArtifactError> {
        let model = self.load_model()?;
        let contract = self.load_contract()?;
        contract.ensure_matches(expected)?;
        if model.n_features() != contract.len() {
            return Err(ArtifactError::FeatureCountMismatch {
                model: model.n_features(),
                contract: contract.len(),
            });
        }
        let metadata = self.load_metadata();

        Ok(ModelArtifacts {
            model,
            contract,
            metadata,
        })
    }

    /// Persist all three artifacts, creating the directories as needed
    pub fn save_all(
        &self,
        model: &GradientBoostedClassifier,
        contract: &FeatureContract,
        metadata: &ModelMetadata,
    ) -> Result<(), ArtifactError> {
        create_parent(&self.model_path)?;
        model
            .save(&self.model_path)
            .map_err(|e| ArtifactError::SaveModel {
                path: self.model_path.clone(),
                reason: format!("{:#}", e),
            })?;
        write_json(&self.features_path, contract, false)?;
        write_json(&self.meta_path, metadata, true)?;
        info!(
            model = %self.model_path.display(),
            features = %self.features_path.display(),
            meta = %self.meta_path.display(),
            "Artifacts saved"
        );
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn create_parent(path: &Path) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ArtifactError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), ArtifactError> {
    create_parent(path)?;
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|source| ArtifactError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, bytes).map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booster::BoosterParams;

    fn tiny_model(n_features: usize) -> GradientBoostedClassifier {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| (0..n_features).map(|j| (i * (j + 1)) as f64).collect())
            .collect();
        let labels: Vec<u8> = (0..20).map(|i| u8::from(i >= 10)).collect();
        let params = BoosterParams {
            n_estimators: 5,
            ..BoosterParams::default()
        };
        GradientBoostedClassifier::fit(&rows, &labels, params).unwrap()
    }

    fn metadata() -> ModelMetadata {
        ModelMetadata {
            model: "XGBoost".to_string(),
            dataset: "test".to_string(),
            target: "Loan_Status".to_string(),
            auc: 0.8,
            accuracy: 0.75,
            features: FeatureContract::loan().names().to_vec(),
            n_train: 16,
            n_validation: 4,
            trained_at: None,
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path().join("models"));
        let model = tiny_model(11);
        let contract = FeatureContract::loan();

        loader.save_all(&model, &contract, &metadata()).unwrap();
        let artifacts = loader.load_all(&FeatureContract::loan()).unwrap();

        let row: Vec<f64> = (0..11).map(f64::from).collect();
        assert_eq!(
            artifacts.model.predict_proba(&row).unwrap().to_bits(),
            model.predict_proba(&row).unwrap().to_bits()
        );
        assert_eq!(artifacts.contract, contract);
        assert_eq!(artifacts.metadata, Some(metadata()));
    }

    #[test]
    fn test_feature_list_written_as_plain_array() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        loader
            .save_all(&tiny_model(11), &FeatureContract::loan(), &metadata())
            .unwrap();

        let raw = std::fs::read_to_string(loader.features_path()).unwrap();
        let names: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(names.len(), 11);
        assert_eq!(names[0], "Gender");
        assert_eq!(names[10], "Property_Area");
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        assert!(matches!(
            loader.load_all(&FeatureContract::loan()),
            Err(ArtifactError::Read { .. })
        ));
    }

    #[test]
    fn test_corrupt_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        loader
            .save_all(&tiny_model(11), &FeatureContract::loan(), &metadata())
            .unwrap();
        std::fs::write(
            loader.model_path(),
            br#"{"nodes":[{"kind":"split","feature":0,"threshold":1.0,"left":7,"right":9}]}"#,
        )
        .unwrap();

        assert!(matches!(
            loader.load_all(&FeatureContract::loan()),
            Err(ArtifactError::InvalidModel { .. })
        ));
    }

    #[test]
    fn test_missing_feature_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        loader
            .save_all(&tiny_model(11), &FeatureContract::loan(), &metadata())
            .unwrap();
        std::fs::remove_file(loader.features_path()).unwrap();

        assert!(matches!(
            loader.load_all(&FeatureContract::loan()),
            Err(ArtifactError::Read { .. })
        ));
    }

    #[test]
    fn test_corrupt_feature_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        loader
            .save_all(&tiny_model(11), &FeatureContract::loan(), &metadata())
            .unwrap();
        std::fs::write(loader.features_path(), b"[\"Gender\", ").unwrap();

        assert!(matches!(
            loader.load_all(&FeatureContract::loan()),
            Err(ArtifactError::Parse { .. })
        ));
    }

    #[test]
    fn test_reordered_contract_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        let mut names = FeatureContract::loan().names().to_vec();
        names.reverse();

        loader
            .save_all(&tiny_model(11), &FeatureContract::new(names), &metadata())
            .unwrap();
        assert!(matches!(
            loader.load_all(&FeatureContract::loan()),
            Err(ArtifactError::ContractMismatch { .. })
        ));
    }

    #[test]
    fn test_model_width_must_match_contract() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        loader
            .save_all(&tiny_model(3), &FeatureContract::loan(), &metadata())
            .unwrap();
        assert!(matches!(
            loader.load_all(&FeatureContract::loan()),
            Err(ArtifactError::FeatureCountMismatch {
                model: 3,
                contract: 11
            })
        ));
    }

    #[test]
    fn test_missing_metadata_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::in_dir(dir.path());
        loader
            .save_all(&tiny_model(11), &FeatureContract::loan(), &metadata())
            .unwrap();
        std::fs::remove_file(loader.meta_path()).unwrap();

        let artifacts = loader.load_all(&FeatureContract::loan()).unwrap();
        assert!(artifacts.metadata.is_none());
    }
}
