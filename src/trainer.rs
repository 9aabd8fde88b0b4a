//! Model training on the cleaned loan dataset.
//!
//! Splits the rows into stratified train/validation partitions, fits the
//! XGBoost classifier, evaluates it on the validation partition and
//! persists the model, the feature contract and a metadata record.

use crate::config::AppConfig;
use crate::evaluation::{accuracy, roc_auc};
use crate::feature_contract::{FeatureContract, TARGET_COLUMN};
use crate::models::booster::{BoosterParams, GradientBoostedClassifier, MODEL_FAMILY};
use crate::models::loader::ModelLoader;
use crate::types::metadata::ModelMetadata;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Decision threshold used for the reported validation accuracy
pub const EVALUATION_THRESHOLD: f64 = 0.5;

/// Feature matrix and labels laid out in contract order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows at the given indices, in index order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Fitted model together with its evaluation record
#[derive(Debug)]
pub struct TrainingOutcome {
    pub model: GradientBoostedClassifier,
    pub contract: FeatureContract,
    pub metadata: ModelMetadata,
}

/// Read a cleaned CSV file, selecting contract columns and the target
pub fn load_dataset<P: AsRef<Path>>(path: P, contract: &FeatureContract) -> Result<Dataset> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open cleaned dataset {}", path.display()))?;
    let dataset = read_dataset(file, contract)?;
    info!(path = %path.display(), rows = dataset.len(), "Dataset loaded");
    Ok(dataset)
}

/// Parse a cleaned CSV stream. Empty feature cells become NaN; rows with an
/// empty or non-binary target are skipped.
pub fn read_dataset<R: Read>(reader: R, contract: &FeatureContract) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers().context("Failed to read CSV header")?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("Cleaned dataset has no `{}` column", name))
    };
    let feature_columns = contract
        .names()
        .iter()
        .map(|name| column(name.as_str()))
        .collect::<Result<Vec<usize>>>()?;
    let target_column = column(TARGET_COLUMN)?;

    let mut dataset = Dataset::default();
    let mut skipped = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", line + 1))?;

        let label = match record.get(target_column).unwrap_or("") {
            "1" | "1.0" => 1,
            "0" | "0.0" => 0,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let row = feature_columns
            .iter()
            .zip(contract.names())
            .map(|(&index, name)| {
                let cell = record.get(index).unwrap_or("");
                if cell.is_empty() {
                    Ok(f64::NAN)
                } else {
                    cell.parse::<f64>().with_context(|| {
                        format!("Row {} column `{}`: `{}` is not numeric", line + 1, name, cell)
                    })
                }
            })
            .collect::<Result<Vec<f64>>>()?;

        dataset.rows.push(row);
        dataset.labels.push(label);
    }

    if skipped > 0 {
        warn!(skipped, "Dropped rows without a usable target");
    }
    Ok(dataset)
}

/// Stratified train/validation split.
///
/// Each class is shuffled with a generator seeded from `seed` and
/// contributes `round(test_size * class_size)` rows to validation. Returned
/// index lists are sorted.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut validation = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        let n_validation = (members.len() as f64 * test_size).round() as usize;
        let n_validation = n_validation.min(members.len().saturating_sub(1));
        validation.extend_from_slice(&members[..n_validation]);
        train.extend_from_slice(&members[n_validation..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    (train, validation)
}

/// Split, fit and evaluate
pub fn train(
    dataset: &Dataset,
    contract: &FeatureContract,
    config: &AppConfig,
) -> Result<TrainingOutcome> {
    if dataset.is_empty() {
        bail!("Cannot train on an empty dataset");
    }

    let training = &config.training;
    let (train_idx, validation_idx) =
        stratified_split(&dataset.labels, training.test_size, training.seed);
    let train_set = dataset.subset(&train_idx);
    let validation_set = dataset.subset(&validation_idx);

    info!(
        train = train_set.len(),
        validation = validation_set.len(),
        positive_rate = positive_rate(&dataset.labels),
        "Stratified split"
    );

    let params = BoosterParams::from(training);
    info!(
        n_estimators = params.n_estimators,
        max_depth = params.max_depth,
        learning_rate = params.learning_rate,
        "Fitting XGBoost classifier"
    );
    let model = GradientBoostedClassifier::fit(&train_set.rows, &train_set.labels, params)?;

    let scores = model
        .predict_proba_batch(&validation_set.rows)
        .context("Failed to score the validation partition")?;
    let auc = roc_auc(&validation_set.labels, &scores)
        .context("Validation partition must contain both classes to compute AUC")?;
    let accuracy = accuracy(&validation_set.labels, &scores, EVALUATION_THRESHOLD)
        .context("Validation partition is empty")?;

    info!(auc = format!("{:.3}", auc), accuracy = format!("{:.3}", accuracy), "Validation metrics");

    let metadata = ModelMetadata {
        model: MODEL_FAMILY.to_string(),
        dataset: config.data.dataset_name.clone(),
        target: TARGET_COLUMN.to_string(),
        auc,
        accuracy,
        features: contract.names().to_vec(),
        n_train: train_set.len(),
        n_validation: validation_set.len(),
        trained_at: Some(Utc::now()),
    };

    Ok(TrainingOutcome {
        model,
        contract: contract.clone(),
        metadata,
    })
}

/// Full offline run: load the cleaned dataset, train, persist the artifacts
pub fn run(config: &AppConfig) -> Result<TrainingOutcome> {
    let contract = FeatureContract::loan();
    let dataset = load_dataset(&config.data.cleaned_path, &contract)?;
    let outcome = train(&dataset, &contract, config)?;

    ModelLoader::new(&config.artifacts)
        .save_all(&outcome.model, &outcome.contract, &outcome.metadata)
        .context("Failed to save model artifacts")?;

    Ok(outcome)
}

fn positive_rate(labels: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    labels.iter().filter(|&&l| l == 1).count() as f64 / labels.len() as f64
}
