//! Random forest regressor
//!
//! The high-variance/low-bias counterpoint to the boosted model: deeper
//! trees, bootstrap row sampling, no leaf regularization. Bagging uses a
//! seeded RNG so a refit on the same data reproduces the same forest.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::features::FeatureTable;
use super::model::{ModelError, Regressor};
use super::tree::{RegressionTree, TreeParams};

/// Forest hyperparameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// A bagged ensemble of regression trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, features: &FeatureTable, targets: &Array1<f64>) -> Result<(), ModelError> {
        let n = features.n_rows();
        if n == 0 {
            return Err(ModelError::InsufficientData(0));
        }
        if n != targets.len() {
            return Err(ModelError::MismatchedLengths {
                features: n,
                targets: targets.len(),
            });
        }

        let x = features.records();
        let all_features: Vec<usize> = (0..features.n_cols()).collect();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            l1: 0.0,
            l2: 0.0,
        };

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut trees = Vec::with_capacity(self.params.n_trees);

        for _ in 0..self.params.n_trees {
            // Bootstrap sample: n draws with replacement
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::grow(
                x,
                targets,
                &rows,
                &all_features,
                &tree_params,
            ));
        }

        self.trees = trees;
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }

        let x = features.records();
        let mut sums = Array1::zeros(features.n_rows());
        for tree in &self.trees {
            sums += &tree.predict(x);
        }
        Ok(sums / self.trees.len() as f64)
    }
}
