//! Weighted ensemble combination
//!
//! Blends the bank's per-model predictions by their validation weights.
//! Zero-weight models are skipped entirely, and a fully muted ensemble
//! yields an explicit zero prediction instead of a NaN from dividing by a
//! zero weight total.

use ndarray::Array1;
use tracing::warn;

use super::bank::{EnsembleWeights, ModelBank};
use super::features::FeatureTable;
use super::model::{ModelError, Regressor};

/// Borrowing view over a trained bank and its weights.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleCombiner<'a> {
    bank: &'a ModelBank,
    weights: &'a EnsembleWeights,
}

impl<'a> EnsembleCombiner<'a> {
    pub fn new(bank: &'a ModelBank, weights: &'a EnsembleWeights) -> Self {
        Self { bank, weights }
    }

    /// Weighted prediction for every row of the table.
    pub fn predict_batch(&self, features: &FeatureTable) -> Result<Array1<f64>, ModelError> {
        let total = self.weights.total();
        let mut blended = Array1::zeros(features.n_rows());

        if total <= 0.0 {
            warn!("all ensemble weights are zero, predicting zero delay");
            return Ok(blended);
        }

        for (name, model) in self.bank.iter() {
            let weight = self.weights.get(name);
            if weight <= 0.0 {
                continue;
            }
            blended += &(model.predict(features)? * (weight / total));
        }
        Ok(blended)
    }
}
