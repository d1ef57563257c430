//! Model bank training and validation weighting
//!
//! Trains every candidate model on the same seeded train/validation/test
//! split and derives ensemble weights from validation performance. A model
//! that scores at or below zero on validation keeps a zero weight and is
//! effectively muted; the test partition is returned untouched for the final
//! evaluation report.

use std::collections::BTreeMap;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::features::FeatureTable;
use super::model::{DelayModel, ModelError, ModelName, Regressor};

/// Split and gating knobs for a training run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Seed for the split shuffle.
    pub seed: u64,
    /// Fraction of samples held out, shared evenly between validation and
    /// test (validation takes the floor half).
    pub holdout_fraction: f64,
    /// Below this many samples training refuses to run.
    pub min_samples: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            seed: 42,
            holdout_fraction: 0.3,
            min_samples: 10,
        }
    }
}

/// The rows never shown to any model during fitting or weighting.
#[derive(Debug, Clone)]
pub struct TestPartition {
    pub features: FeatureTable,
    pub targets: Array1<f64>,
}

/// The fitted models, keyed by slot name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBank {
    models: BTreeMap<ModelName, DelayModel>,
}

impl ModelBank {
    pub fn from_models(models: BTreeMap<ModelName, DelayModel>) -> Self {
        Self { models }
    }

    pub fn get(&self, name: ModelName) -> Option<&DelayModel> {
        self.models.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelName, &DelayModel)> {
        self.models.iter().map(|(name, model)| (*name, model))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn into_models(self) -> BTreeMap<ModelName, DelayModel> {
        self.models
    }
}

/// Normalized blend weights per model slot.
///
/// Raw validation scores are clamped at zero before normalizing; when every
/// score is non-positive the weights stay all-zero and `total` reports 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    weights: BTreeMap<ModelName, f64>,
}

impl EnsembleWeights {
    pub fn from_scores(scores: BTreeMap<ModelName, f64>) -> Self {
        let mut weights: BTreeMap<ModelName, f64> = scores
            .into_iter()
            .map(|(name, score)| (name, score.max(0.0)))
            .collect();

        let total: f64 = weights.values().sum();
        if total > 0.0 {
            for w in weights.values_mut() {
                *w /= total;
            }
        }
        Self { weights }
    }

    pub fn get(&self, name: ModelName) -> f64 {
        self.weights.get(&name).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelName, f64)> + '_ {
        self.weights.iter().map(|(name, w)| (*name, *w))
    }
}

/// Train every candidate on a shared seeded split.
///
/// Fatal on an empty or undersized dataset; a model that fails to fit is a
/// hard error rather than a silently missing slot.
pub fn train_bank(
    features: &FeatureTable,
    targets: &Array1<f64>,
    candidates: Vec<DelayModel>,
    params: &TrainingParams,
) -> Result<(ModelBank, EnsembleWeights, TestPartition), ModelError> {
    let n = features.n_rows();
    if n != targets.len() {
        return Err(ModelError::MismatchedLengths {
            features: n,
            targets: targets.len(),
        });
    }
    if n < params.min_samples {
        return Err(ModelError::InsufficientData(n));
    }

    let split = SplitIndices::new(n, params.holdout_fraction, params.seed);
    debug!(
        train = split.train.len(),
        validation = split.validation.len(),
        test = split.test.len(),
        "partitioned samples"
    );

    let train_x = features.select_rows(&split.train);
    let train_y = select(targets, &split.train);
    let val_x = features.select_rows(&split.validation);
    let val_y = select(targets, &split.validation);

    let mut models = BTreeMap::new();
    let mut scores = BTreeMap::new();

    for mut model in candidates {
        let name = model.name();
        model.fit(&train_x, &train_y)?;

        let score = model.score(&val_x, &val_y)?;
        if score <= 0.0 {
            warn!(model = %name, score, "validation score non-positive, weight muted");
        } else {
            info!(model = %name, score, "validated");
        }

        scores.insert(name, score);
        models.insert(name, model);
    }

    let weights = EnsembleWeights::from_scores(scores);
    let partition = TestPartition {
        features: features.select_rows(&split.test),
        targets: select(targets, &split.test),
    };

    Ok((ModelBank::from_models(models), weights, partition))
}

struct SplitIndices {
    train: Vec<usize>,
    validation: Vec<usize>,
    test: Vec<usize>,
}

impl SplitIndices {
    fn new(n: usize, holdout_fraction: f64, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        // Never hold out everything
        let n_holdout = ((n as f64 * holdout_fraction).round() as usize).min(n.saturating_sub(1));
        let n_val = n_holdout / 2;
        let n_test = n_holdout - n_val;

        let test = indices.split_off(n - n_test);
        let validation = indices.split_off(n - n_holdout);
        Self {
            train: indices,
            validation,
            test,
        }
    }
}

fn select(values: &Array1<f64>, rows: &[usize]) -> Array1<f64> {
    Array1::from_iter(rows.iter().map(|&r| values[r]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::generate_samples;
    use crate::ml::boost::{BoostParams, GradientBoostedRegressor};
    use crate::ml::features::FeatureBuilder;
    use crate::ml::forest::{ForestParams, RandomForestRegressor};
    use crate::ml::kernel::{KernelRidge, KernelRidgeParams};
    use approx::assert_relative_eq;

    fn candidates() -> Vec<DelayModel> {
        vec![
            DelayModel::Boosted(GradientBoostedRegressor::new(BoostParams {
                n_rounds: 25,
                ..BoostParams::default()
            })),
            DelayModel::Forest(RandomForestRegressor::new(ForestParams {
                n_trees: 15,
                ..ForestParams::default()
            })),
            DelayModel::KernelRidge(KernelRidge::new(KernelRidgeParams::default(), None)),
        ]
    }

    #[test]
    fn test_split_sizes_cover_all_rows() {
        let split = SplitIndices::new(100, 0.3, 42);
        assert_eq!(split.train.len(), 70);
        assert_eq!(split.validation.len(), 15);
        assert_eq!(split.test.len(), 15);

        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.validation)
            .chain(&split.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_odd_holdout_gives_validation_the_floor() {
        // n=11, holdout round(3.3)=3: validation 1, test 2
        let split = SplitIndices::new(11, 0.3, 42);
        assert_eq!(split.validation.len(), 1);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_split_is_seed_deterministic() {
        let a = SplitIndices::new(50, 0.3, 7);
        let b = SplitIndices::new(50, 0.3, 7);
        assert_eq!(a.train, b.train);
        assert_eq!(a.validation, b.validation);
        assert_eq!(a.test, b.test);

        let c = SplitIndices::new(50, 0.3, 8);
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn test_train_refuses_undersized_dataset() {
        let samples = generate_samples(5, 42);
        let (table, targets) = FeatureBuilder::new(50.0).build_table(&samples);

        let result = train_bank(&table, &targets, candidates(), &TrainingParams::default());
        assert!(matches!(result, Err(ModelError::InsufficientData(5))));
    }

    #[test]
    fn test_train_produces_normalized_weights() {
        let samples = generate_samples(200, 42);
        let (table, targets) = FeatureBuilder::new(50.0).build_table(&samples);

        let (bank, weights, partition) =
            train_bank(&table, &targets, candidates(), &TrainingParams::default()).unwrap();

        assert_eq!(bank.len(), 3);
        assert_eq!(partition.targets.len(), 30);

        let total = weights.total();
        assert!(total == 0.0 || (total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_training_is_reproducible() {
        let samples = generate_samples(150, 42);
        let (table, targets) = FeatureBuilder::new(50.0).build_table(&samples);
        let params = TrainingParams::default();

        let (bank_a, weights_a, _) =
            train_bank(&table, &targets, candidates(), &params).unwrap();
        let (bank_b, weights_b, _) =
            train_bank(&table, &targets, candidates(), &params).unwrap();

        assert_eq!(weights_a, weights_b);
        for (name, model) in bank_a.iter() {
            let other = bank_b.get(name).unwrap();
            assert_eq!(
                model.predict(&table).unwrap(),
                other.predict(&table).unwrap()
            );
        }
    }

    #[test]
    fn test_weights_clamp_negative_scores() {
        let mut scores = BTreeMap::new();
        scores.insert(ModelName::Boosted, -0.5);
        scores.insert(ModelName::Forest, 0.6);
        scores.insert(ModelName::KernelRidge, 0.2);

        let weights = EnsembleWeights::from_scores(scores);
        assert_relative_eq!(weights.get(ModelName::Boosted), 0.0);
        assert_relative_eq!(weights.get(ModelName::Forest), 0.75);
        assert_relative_eq!(weights.get(ModelName::KernelRidge), 0.25);
        assert_relative_eq!(weights.total(), 1.0);
    }

    #[test]
    fn test_all_negative_scores_leave_weights_zero() {
        let mut scores = BTreeMap::new();
        scores.insert(ModelName::Boosted, -0.5);
        scores.insert(ModelName::Forest, -0.1);

        let weights = EnsembleWeights::from_scores(scores);
        assert_eq!(weights.total(), 0.0);
    }

    #[test]
    fn test_single_survivor_takes_full_weight() {
        let mut scores = BTreeMap::new();
        scores.insert(ModelName::Boosted, -0.2);
        scores.insert(ModelName::Forest, 0.4);
        scores.insert(ModelName::KernelRidge, -1.0);

        let weights = EnsembleWeights::from_scores(scores);
        assert_relative_eq!(weights.get(ModelName::Forest), 1.0);
    }
}
