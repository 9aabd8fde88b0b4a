//! Model training, persistence and inference components

pub mod booster;
pub mod inference;
pub mod loader;

pub use booster::{BoosterParams, GradientBoostedClassifier};
pub use inference::InferenceEngine;
pub use loader::{ModelArtifacts, ModelLoader};

use anyhow::Result;

/// A binary classifier producing positive-class probabilities from an
/// ordered feature vector.
///
/// Implementations are shared across request handlers, so they must be
/// safe to call concurrently through `&self`.
pub trait ProbabilisticClassifier: Send + Sync {
    /// Length of the input vector the model was fitted on
    fn n_features(&self) -> usize;

    /// Probability of the positive class, in [0, 1]
    fn predict_proba(&self, features: &[f64]) -> Result<f64>;

    /// Probabilities for many rows
    fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_proba(row)).collect()
    }
}
