//! XGBoost binary classifier.
//!
//! Fitting and persistence go through the `xgboost` bindings with the
//! `binary:logistic` objective, so predictions are positive-class
//! probabilities. The fitted width is stored as a booster attribute and
//! travels with the saved model file.

use super::ProbabilisticClassifier;
use crate::config::TrainingConfig;
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use xgboost::parameters::learning::{LearningTaskParametersBuilder, Objective};
use xgboost::parameters::tree::TreeBoosterParametersBuilder;
use xgboost::parameters::{
    BoosterParameters, BoosterParametersBuilder, BoosterType, TrainingParametersBuilder,
};
use xgboost::{Booster, DMatrix};

/// Model family name recorded in metadata
pub const MODEL_FAMILY: &str = "XGBoost";

/// Booster attribute holding the number of input features
const N_FEATURES_ATTR: &str = "n_features";

/// Booster hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for BoosterParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            learning_rate: config.learning_rate,
            subsample: config.subsample,
            colsample_bytree: config.colsample_bytree,
            lambda: config.lambda,
            gamma: config.gamma,
            min_child_weight: config.min_child_weight,
            seed: config.seed,
        }
    }
}

impl BoosterParams {
    fn booster_parameters(&self) -> Result<BoosterParameters> {
        let tree_params = TreeBoosterParametersBuilder::default()
            .max_depth(self.max_depth as u32)
            .eta(self.learning_rate as f32)
            .subsample(self.subsample as f32)
            .colsample_bytree(self.colsample_bytree as f32)
            .lambda(self.lambda as f32)
            .gamma(self.gamma as f32)
            .min_child_weight(self.min_child_weight as f32)
            .build()
            .map_err(|e| anyhow!("Invalid tree parameters: {}", e))?;

        let learning_params = LearningTaskParametersBuilder::default()
            .objective(Objective::BinaryLogistic)
            .seed(self.seed)
            .build()
            .map_err(|e| anyhow!("Invalid learning parameters: {}", e))?;

        BoosterParametersBuilder::default()
            .booster_type(BoosterType::Tree(tree_params))
            .learning_params(learning_params)
            .verbose(false)
            .build()
            .map_err(|e| anyhow!("Invalid booster parameters: {}", e))
    }
}

/// Owned booster handle.
struct BoosterHandle(Booster);

// SAFETY: the native handle is owned by exactly one `BoosterHandle` and is
// only touched while holding the `Mutex` in `GradientBoostedClassifier`.
unsafe impl Send for BoosterHandle {}

/// Fitted XGBoost binary classifier
pub struct GradientBoostedClassifier {
    booster: Mutex<BoosterHandle>,
    n_features: usize,
}

impl std::fmt::Debug for GradientBoostedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientBoostedClassifier")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl GradientBoostedClassifier {
    /// Fit on row-major features and 0/1 labels. NaN marks a missing value.
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], params: BoosterParams) -> Result<Self> {
        ensure!(!rows.is_empty(), "Cannot fit with 0 samples");
        ensure!(
            rows.len() == labels.len(),
            "Feature rows ({}) and labels ({}) differ in length",
            rows.len(),
            labels.len()
        );
        ensure!(
            labels.iter().all(|&l| l <= 1),
            "Labels must be binary (0 or 1)"
        );
        let n_features = rows[0].len();
        ensure!(n_features > 0, "Cannot fit with 0 features");
        ensure!(
            params.subsample > 0.0 && params.subsample <= 1.0,
            "subsample must be within (0, 1]"
        );
        ensure!(
            params.colsample_bytree > 0.0 && params.colsample_bytree <= 1.0,
            "colsample_bytree must be within (0, 1]"
        );

        let mut booster = train_booster(rows, labels, &params)?;
        booster
            .set_attribute(N_FEATURES_ATTR, &n_features.to_string())
            .context("Failed to record feature count on the booster")?;

        debug!(
            rounds = params.n_estimators,
            features = n_features,
            "Booster fitted"
        );
        Ok(Self::from_booster(booster, n_features))
    }

    /// Load a model written by [`GradientBoostedClassifier::save`].
    ///
    /// The file must carry its feature count and must score a row of
    /// missing values to a probability, otherwise it is rejected.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let booster = Booster::load(path.as_ref()).context("Not a loadable XGBoost model")?;
        let n_features = booster
            .get_attribute(N_FEATURES_ATTR)
            .context("Failed to read booster attributes")?
            .ok_or_else(|| anyhow!("Model carries no `{}` attribute", N_FEATURES_ATTR))?
            .parse::<usize>()
            .with_context(|| format!("Attribute `{}` is not a count", N_FEATURES_ATTR))?;
        ensure!(n_features > 0, "Model was fitted on 0 features");

        let model = Self::from_booster(booster, n_features);
        let probability = model
            .predict_proba(&vec![f64::NAN; n_features])
            .context("Model failed to score a test row")?;
        ensure!(
            (0.0..=1.0).contains(&probability),
            "Model produced {} for a test row, not a probability",
            probability
        );
        Ok(model)
    }

    /// Write the booster in XGBoost's native format
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let handle = self.lock()?;
        handle.0.save(path.as_ref())?;
        Ok(())
    }

    /// Positive-class probability for one row
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        let rows = [row.to_vec()];
        self.predict_proba_batch(&rows)?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Booster returned no prediction"))
    }

    /// Positive-class probabilities for many rows
    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        ensure!(
            rows.iter().all(|r| r.len() == self.n_features),
            "Every row must have {} features",
            self.n_features
        );
        let matrix = dense_matrix(rows)?;
        let handle = self.lock()?;
        let predictions = handle.0.predict(&matrix)?;
        Ok(predictions.into_iter().map(f64::from).collect())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn from_booster(booster: Booster, n_features: usize) -> Self {
        Self {
            booster: Mutex::new(BoosterHandle(booster)),
            n_features,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BoosterHandle>> {
        self.booster
            .lock()
            .map_err(|_| anyhow!("Booster lock poisoned"))
    }
}

impl ProbabilisticClassifier for GradientBoostedClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64> {
        GradientBoostedClassifier::predict_proba(self, features)
    }

    fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        GradientBoostedClassifier::predict_proba_batch(self, rows)
    }
}

fn train_booster(rows: &[Vec<f64>], labels: &[u8], params: &BoosterParams) -> Result<Booster> {
    let n_features = rows[0].len();
    ensure!(
        rows.iter().all(|r| r.len() == n_features),
        "All feature rows must have {} values",
        n_features
    );

    let mut train = dense_matrix(rows)?;
    let targets: Vec<f32> = labels.iter().map(|&l| f32::from(l)).collect();
    train.set_labels(&targets)?;

    let training_params = TrainingParametersBuilder::default()
        .dtrain(&train)
        .boost_rounds(params.n_estimators as u32)
        .booster_params(params.booster_parameters()?)
        .build()
        .map_err(|e| anyhow!("Invalid training parameters: {}", e))?;

    Ok(Booster::train(&training_params)?)
}

/// Row-major `f32` matrix; NaN stays missing
fn dense_matrix(rows: &[Vec<f64>]) -> Result<DMatrix> {
    let data: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
    Ok(DMatrix::from_dense(&data, rows.len())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Two noisy clusters, label driven mostly by the first feature
    fn toy_dataset(n: usize) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut rows = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let label = (i % 2) as u8;
            let center = if label == 1 { 2.0 } else { -2.0 };
            rows.push(vec![
                center + rng.gen_range(-1.5..1.5),
                rng.gen_range(-1.0..1.0),
            ]);
            labels.push(label);
        }
        (rows, labels)
    }

    fn small_params() -> BoosterParams {
        BoosterParams {
            n_estimators: 40,
            max_depth: 3,
            learning_rate: 0.3,
            ..BoosterParams::default()
        }
    }

    #[test]
    fn test_default_params_match_training_config() {
        let params = BoosterParams::default();
        assert_eq!(params.n_estimators, 250);
        assert_eq!(params.max_depth, 4);
        assert_eq!(params.learning_rate, 0.05);
        assert_eq!(params.subsample, 0.9);
        assert_eq!(params.colsample_bytree, 0.9);
        assert_eq!(params.seed, 42);
    }

    #[test]
    fn test_fit_separates_classes() {
        let (rows, labels) = toy_dataset(200);
        let model = GradientBoostedClassifier::fit(&rows, &labels, small_params()).unwrap();

        assert_eq!(model.n_features(), 2);
        assert!(model.predict_proba(&[3.0, 0.0]).unwrap() > 0.8);
        assert!(model.predict_proba(&[-3.0, 0.0]).unwrap() < 0.2);

        let scores = model.predict_proba_batch(&rows).unwrap();
        let correct = scores
            .iter()
            .zip(&labels)
            .filter(|(&p, &l)| u8::from(p >= 0.5) == l)
            .count();
        assert!(correct as f64 / rows.len() as f64 > 0.9);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (rows, labels) = toy_dataset(100);
        let model = GradientBoostedClassifier::fit(&rows, &labels, small_params()).unwrap();
        for p in model.predict_proba_batch(&rows).unwrap() {
            assert!((0.0..=1.0).contains(&p));
        }
        let p = model.predict_proba(&[f64::NAN, f64::NAN]).unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let (rows, labels) = toy_dataset(60);
        let model = GradientBoostedClassifier::fit(&rows, &labels, small_params()).unwrap();
        assert!(model.predict_proba(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let (rows, labels) = toy_dataset(120);
        let first = GradientBoostedClassifier::fit(&rows, &labels, small_params()).unwrap();
        let second = GradientBoostedClassifier::fit(&rows, &labels, small_params()).unwrap();
        assert_eq!(
            first.predict_proba_batch(&rows).unwrap(),
            second.predict_proba_batch(&rows).unwrap()
        );
    }

    #[test]
    fn test_save_and_load_preserve_probabilities() {
        let (rows, labels) = toy_dataset(150);
        let model = GradientBoostedClassifier::fit(&rows, &labels, small_params()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        model.save(&path).unwrap();
        let restored = GradientBoostedClassifier::load(&path).unwrap();

        assert_eq!(restored.n_features(), 2);
        let before = model.predict_proba_batch(&rows).unwrap();
        let after = restored.predict_proba_batch(&rows).unwrap();
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.to_bits(), a.to_bits());
        }
    }

    #[test]
    fn test_load_requires_feature_count() {
        let (rows, labels) = toy_dataset(60);
        let booster = train_booster(&rows, &labels, &small_params()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.bin");
        booster.save(&path).unwrap();

        let err = GradientBoostedClassifier::load(&path).unwrap_err();
        assert!(err.to_string().contains("n_features"), "{err:#}");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"{\"nodes\":[{\"kind\":\"split\",\"left\":7,\"right\":9}]}").unwrap();
        assert!(GradientBoostedClassifier::load(&path).is_err());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(GradientBoostedClassifier::fit(&[], &[], small_params()).is_err());
        assert!(
            GradientBoostedClassifier::fit(&[vec![1.0], vec![2.0]], &[1], small_params()).is_err()
        );
        assert!(
            GradientBoostedClassifier::fit(&[vec![1.0], vec![2.0]], &[0, 2], small_params())
                .is_err()
        );
        assert!(GradientBoostedClassifier::fit(
            &[vec![1.0, 2.0], vec![2.0]],
            &[0, 1],
            small_params()
        )
        .is_err());
    }
}
