//! Gradient-boosted regression trees
//!
//! Shallow trees, a small learning rate, row/column subsampling and L1+L2
//! leaf regularization: tuned to pick up general delay patterns rather than
//! memorize noise on a modest sample count. Each round fits a tree to the
//! current residuals and adds a damped copy of it to the ensemble.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::features::FeatureTable;
use super::model::{ModelError, Regressor};
use super::tree::{RegressionTree, TreeParams};

/// Boosting hyperparameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostParams {
    pub n_rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows drawn (without replacement) per round.
    pub subsample: f64,
    /// Fraction of columns considered per round.
    pub colsample: f64,
    /// L1 leaf regularization.
    pub reg_alpha: f64,
    /// L2 leaf regularization.
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            max_depth: 3,
            learning_rate: 0.03,
            subsample: 0.7,
            colsample: 0.7,
            reg_alpha: 0.5,
            reg_lambda: 1.5,
            seed: 42,
        }
    }
}

/// A fitted gradient-boosted tree ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    params: BoostParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    pub fn new(params: BoostParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }
}

/// At least one element, at most all of them.
fn sampled_count(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction) as usize).clamp(1, total)
}

impl Regressor for GradientBoostedRegressor {
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
        let m = features.n_cols();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            l1: self.params.reg_alpha,
            l2: self.params.reg_lambda,
        };

        let base_score = targets.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, base_score);
        let mut residuals = targets - &predictions;

        let n_rows = sampled_count(n, self.params.subsample);
        let n_cols = sampled_count(m, self.params.colsample);
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut trees = Vec::with_capacity(self.params.n_rounds);

        for _ in 0..self.params.n_rounds {
            let mut rows: Vec<usize> = (0..n).collect();
            rows.shuffle(&mut rng);
            rows.truncate(n_rows);

            let mut cols: Vec<usize> = (0..m).collect();
            cols.shuffle(&mut rng);
            cols.truncate(n_cols);
            cols.sort_unstable();

            let tree = RegressionTree::grow(x, &residuals, &rows, &cols, &tree_params);
            let step = tree.predict(x) * self.params.learning_rate;
            predictions += &step;
            residuals = targets - &predictions;
            trees.push(tree);
        }

        self.base_score = base_score;
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }

        let x = features.records();
        let mut predictions = Array1::from_elem(features.n_rows(), self.base_score);
        for tree in &self.trees {
            predictions += &(tree.predict(x) * self.params.learning_rate);
        }
        Ok(predictions)
    }
}
