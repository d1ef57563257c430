//! Machine learning module for delay prediction
//!
//! A heterogeneous regression ensemble over zone-influence features: gradient
//! boosted trees, a random forest and a kernel-augmented ridge model, blended
//! by validation-derived weights.

pub mod bank;
pub mod boost;
pub mod ensemble;
pub mod evaluation;
pub mod features;
pub mod forest;
pub mod kernel;
pub mod model;
pub mod persistence;
mod tree;

use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dataset::TrainingSample;
use crate::zones::ZoneInteractionMatrix;

pub use bank::{EnsembleWeights, ModelBank, TestPartition, TrainingParams};
pub use boost::{BoostParams, GradientBoostedRegressor};
pub use ensemble::EnsembleCombiner;
pub use evaluation::{EvaluationReport, ModelScore};
pub use features::{FeatureBuilder, FeatureTable, FeatureVector};
pub use forest::{ForestParams, RandomForestRegressor};
pub use kernel::{KernelRidge, KernelRidgeParams};
pub use model::{DelayModel, ModelError, ModelName, Regressor};
pub use persistence::{ModelStore, PersistenceError};

/// Errors surfaced by the predictor facade.
#[derive(Debug, Error)]
pub enum PredictorError {
    /// Prediction requested before any training or model load.
    #[error("predictor has not been trained")]
    NotTrained,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Configuration for the full prediction pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Scale of the builder's Gaussian distance-decay feature.
    pub feature_decay_scale_km: f64,
    pub training: TrainingParams,
    pub boost: BoostParams,
    pub forest: ForestParams,
    pub kernel: KernelRidgeParams,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            feature_decay_scale_km: 50.0,
            training: TrainingParams::default(),
            boost: BoostParams::default(),
            forest: ForestParams::default(),
            kernel: KernelRidgeParams::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct TrainedEnsemble {
    bank: ModelBank,
    weights: EnsembleWeights,
}

/// Main predictor that ties feature construction, the model bank and the
/// weighted combiner together.
#[derive(Debug, Clone)]
pub struct DelayPredictor {
    config: PredictorConfig,
    builder: FeatureBuilder,
    zone_matrix: Option<ZoneInteractionMatrix>,
    trained: Option<TrainedEnsemble>,
    training_samples: usize,
}

impl DelayPredictor {
    /// The interaction matrix gates the kernel model's bottleneck term; pass
    /// `None` to train without it.
    pub fn new(config: PredictorConfig, zone_matrix: Option<ZoneInteractionMatrix>) -> Self {
        Self {
            builder: FeatureBuilder::new(config.feature_decay_scale_km),
            config,
            zone_matrix,
            trained: None,
            training_samples: 0,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    pub fn weights(&self) -> Option<&EnsembleWeights> {
        self.trained.as_ref().map(|t| &t.weights)
    }

    fn candidates(&self) -> Vec<DelayModel> {
        vec![
            DelayModel::Boosted(GradientBoostedRegressor::new(self.config.boost)),
            DelayModel::Forest(RandomForestRegressor::new(self.config.forest)),
            DelayModel::KernelRidge(KernelRidge::new(
                self.config.kernel,
                self.zone_matrix.clone(),
            )),
        ]
    }

    /// Train every model on a shared split and keep the test partition for
    /// evaluation. An empty or undersized dataset is a hard error.
    pub fn train(&mut self, samples: &[TrainingSample]) -> Result<TestPartition, PredictorError> {
        let (table, targets) = self.builder.build_table(samples);
        let (bank, weights, partition) = bank::train_bank(
            &table,
            &targets,
            self.candidates(),
            &self.config.training,
        )?;

        info!(
            samples = samples.len(),
            models = bank.len(),
            "ensemble trained"
        );
        self.trained = Some(TrainedEnsemble { bank, weights });
        self.training_samples = samples.len();
        Ok(partition)
    }

    /// Test-set metrics for every model and the blend.
    pub fn evaluate(&self, partition: &TestPartition) -> Result<EvaluationReport, PredictorError> {
        let trained = self.trained.as_ref().ok_or(PredictorError::NotTrained)?;
        Ok(EvaluationReport::evaluate(
            &trained.bank,
            &trained.weights,
            partition,
        )?)
    }

    /// Blended predictions for a batch of trips.
    pub fn predict_batch(
        &self,
        samples: &[TrainingSample],
    ) -> Result<Array1<f64>, PredictorError> {
        let trained = self.trained.as_ref().ok_or(PredictorError::NotTrained)?;
        let (table, _) = self.builder.build_table(samples);
        let combiner = EnsembleCombiner::new(&trained.bank, &trained.weights);
        Ok(combiner.predict_batch(&table)?)
    }

    /// Blended delay estimate for a single trip.
    pub fn predict_one(
        &self,
        distance_km: f64,
        time_of_day: u8,
        day_of_week: u8,
        is_peak_hour: bool,
        is_cologne_bottleneck: bool,
    ) -> Result<f64, PredictorError> {
        let trained = self.trained.as_ref().ok_or(PredictorError::NotTrained)?;
        let table = self.builder.single_row(
            distance_km,
            time_of_day,
            day_of_week,
            is_peak_hour,
            is_cologne_bottleneck,
        );
        let combiner = EnsembleCombiner::new(&trained.bank, &trained.weights);
        Ok(combiner.predict_batch(&table)?[0])
    }

    /// Persist the trained ensemble, plus a JSON weights sidecar next to it.
    pub fn save(&self, path: &Path) -> Result<(), PredictorError> {
        let trained = self.trained.as_ref().ok_or(PredictorError::NotTrained)?;
        let store = ModelStore::new(
            trained.bank.clone(),
            trained.weights.clone(),
            self.training_samples,
        );
        store.save(path)?;
        store.write_weights_json(&path.with_extension("weights.json"))?;
        info!(path = %path.display(), "{}", store.summary());
        Ok(())
    }

    /// Rebuild a predictor from a persisted store.
    pub fn load(
        path: &Path,
        config: PredictorConfig,
        zone_matrix: Option<ZoneInteractionMatrix>,
    ) -> Result<Self, PredictorError> {
        let store = ModelStore::load(path)?;
        let training_samples = store.training_samples;
        let (bank, weights) = store.into_parts();

        let mut predictor = Self::new(config, zone_matrix);
        predictor.trained = Some(TrainedEnsemble { bank, weights });
        predictor.training_samples = training_samples;
        Ok(predictor)
    }
}
