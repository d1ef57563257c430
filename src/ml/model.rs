//! The regressor capability set and the concrete model variants
//!
//! Every model in the ensemble exposes exactly fit / predict / score. The
//! bank and the combiner only see this surface, so the concrete algorithms
//! behind each slot can change without touching either.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::boost::GradientBoostedRegressor;
use super::evaluation::r2_score;
use super::features::FeatureTable;
use super::forest::RandomForestRegressor;
use super::kernel::KernelRidge;

/// Errors raised during model fitting and prediction.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Not enough data to train.
    #[error("insufficient data for training: {0} samples")]
    InsufficientData(usize),
    /// Feature and target arrays have different lengths.
    #[error("feature and target lengths mismatch: {features} vs {targets}")]
    MismatchedLengths { features: usize, targets: usize },
    /// Predict called on a model that was never fitted.
    #[error("model has not been fitted")]
    NotFitted,
    /// Error inside the fitting algorithm.
    #[error("model fitting error: {0}")]
    Fit(String),
}

/// The capability set shared by all ensemble members.
///
/// A model is fitted once; re-fitting produces a logically new model. After
/// `fit` returns, the model is treated as immutable.
pub trait Regressor {
    /// Fit the model on a feature table and target vector.
    fn fit(&mut self, features: &FeatureTable, targets: &Array1<f64>) -> Result<(), ModelError>;

    /// Predict one value per row of the table.
    fn predict(&self, features: &FeatureTable) -> Result<Array1<f64>, ModelError>;

    /// Coefficient of determination on held-out data.
    fn score(&self, features: &FeatureTable, targets: &Array1<f64>) -> Result<f64, ModelError> {
        let predictions = self.predict(features)?;
        Ok(r2_score(targets, &predictions))
    }
}

/// Names of the three ensemble slots.
///
/// `Ord` gives the bank's model map a stable, deterministic iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelName {
    Boosted,
    Forest,
    KernelRidge,
}

impl ModelName {
    pub const ALL: [ModelName; 3] = [ModelName::Boosted, ModelName::Forest, ModelName::KernelRidge];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::Boosted => "boosted",
            ModelName::Forest => "forest",
            ModelName::KernelRidge => "kernel_ridge",
        }
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete ensemble member, serializable for the model store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DelayModel {
    Boosted(GradientBoostedRegressor),
    Forest(RandomForestRegressor),
    KernelRidge(KernelRidge),
}

impl DelayModel {
    pub fn name(&self) -> ModelName {
        match self {
            DelayModel::Boosted(_) => ModelName::Boosted,
            DelayModel::Forest(_) => ModelName::Forest,
            DelayModel::KernelRidge(_) => ModelName::KernelRidge,
        }
    }
}

impl Regressor for DelayModel {
    fn fit(&mut self, features: &FeatureTable, targets: &Array1<f64>) -> Result<(), ModelError> {
        match self {
            DelayModel::Boosted(m) => m.fit(features, targets),
            DelayModel::Forest(m) => m.fit(features, targets),
            DelayModel::KernelRidge(m) => m.fit(features, targets),
        }
    }

    fn predict(&self, features: &FeatureTable) -> Result<Array1<f64>, ModelError> {
        match self {
            DelayModel::Boosted(m) => m.predict(features),
            DelayModel::Forest(m) => m.predict(features),
            DelayModel::KernelRidge(m) => m.predict(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names_are_distinct() {
        let names: Vec<&str> = ModelName::ALL.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["boosted", "forest", "kernel_ridge"]);
    }

    #[test]
    fn test_model_name_ordering_is_stable() {
        let mut shuffled = vec![ModelName::KernelRidge, ModelName::Boosted, ModelName::Forest];
        shuffled.sort();
        assert_eq!(shuffled, ModelName::ALL.to_vec());
    }

    #[test]
    fn test_display_matches_as_str() {
        for name in ModelName::ALL {
            assert_eq!(format!("{}", name), name.as_str());
        }
    }
}
