//! Model persistence - save and reload trained ensembles
//!
//! The whole bank round-trips through bincode in one versioned record; the
//! blend weights additionally get a human-readable JSON sidecar next to the
//! binary store.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bank::{EnsembleWeights, ModelBank};
use super::model::{DelayModel, ModelName};

/// Errors that can occur during model persistence
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("model file not found: {0}")]
    FileNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model store version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Serializable snapshot of a trained ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStore {
    /// Version for backward compatibility
    pub version: u32,
    /// When the ensemble was trained
    pub created_at: DateTime<Utc>,
    /// Number of samples used for training
    pub training_samples: usize,
    /// Validation-derived blend weights
    pub weights: EnsembleWeights,
    /// The fitted models, keyed by slot
    pub models: BTreeMap<ModelName, DelayModel>,
}

impl ModelStore {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(bank: ModelBank, weights: EnsembleWeights, training_samples: usize) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            created_at: Utc::now(),
            training_samples,
            weights,
            models: bank.into_models(),
        }
    }

    pub fn into_parts(self) -> (ModelBank, EnsembleWeights) {
        (ModelBank::from_models(self.models), self.weights)
    }

    /// Save to a file using bincode, creating parent directories if needed
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serialize(self)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Load from a file, rejecting stores written by a newer version
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Err(PersistenceError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let bytes = fs::read(path)?;
        let store: Self = bincode::deserialize(&bytes)?;

        if store.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: store.version,
            });
        }
        Ok(store)
    }

    /// Write the blend weights as pretty JSON for inspection
    pub fn write_weights_json(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let named: BTreeMap<&str, f64> = self
            .weights
            .iter()
            .map(|(name, w)| (name.as_str(), w))
            .collect();
        fs::write(path, serde_json::to_string_pretty(&named)?)?;
        Ok(())
    }

    /// One-line human-readable description
    pub fn summary(&self) -> String {
        format!(
            "Model store v{}: {} models, {} samples, created {}",
            self.version,
            self.models.len(),
            self.training_samples,
            self.created_at.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::generate_samples;
    use crate::ml::bank::{train_bank, TrainingParams};
    use crate::ml::boost::{BoostParams, GradientBoostedRegressor};
    use crate::ml::features::FeatureBuilder;
    use crate::ml::forest::{ForestParams, RandomForestRegressor};
    use crate::ml::kernel::{KernelRidge, KernelRidgeParams};
    use crate::ml::model::Regressor;
    use tempfile::tempdir;

    fn trained_store() -> (ModelStore, crate::ml::features::FeatureTable) {
        let samples = generate_samples(120, 42);
        let (table, targets) = FeatureBuilder::new(50.0).build_table(&samples);
        let candidates = vec![
            DelayModel::Boosted(GradientBoostedRegressor::new(BoostParams {
                n_rounds: 10,
                ..BoostParams::default()
            })),
            DelayModel::Forest(RandomForestRegressor::new(ForestParams {
                n_trees: 5,
                ..ForestParams::default()
            })),
            DelayModel::KernelRidge(KernelRidge::new(KernelRidgeParams::default(), None)),
        ];
        let (bank, weights, _) =
            train_bank(&table, &targets, candidates, &TrainingParams::default()).unwrap();
        (ModelStore::new(bank, weights, samples.len()), table)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let (store, table) = trained_store();

        store.save(&path).unwrap();
        let loaded = ModelStore::load(&path).unwrap();

        assert_eq!(loaded.version, store.version);
        assert_eq!(loaded.training_samples, 120);
        assert_eq!(loaded.weights, store.weights);

        // Reloaded models predict identically
        for (name, model) in &store.models {
            let reloaded = loaded.models.get(name).unwrap();
            assert_eq!(
                model.predict(&table).unwrap(),
                reloaded.predict(&table).unwrap()
            );
        }
    }

    #[test]
    fn test_load_nonexistent() {
        let result = ModelStore::load(Path::new("/nonexistent/path/model.bin"));
        assert!(matches!(result, Err(PersistenceError::FileNotFound(_))));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let (mut store, _) = trained_store();
        store.version = ModelStore::CURRENT_VERSION + 1;
        store.save(&path).unwrap();

        let result = ModelStore::load(&path);
        assert!(matches!(
            result,
            Err(PersistenceError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dirs").join("model.bin");
        let (store, _) = trained_store();

        store.save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_weights_json_names_every_slot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let (store, _) = trained_store();

        store.write_weights_json(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("boosted"));
        assert!(text.contains("forest"));
        assert!(text.contains("kernel_ridge"));
    }

    #[test]
    fn test_summary_mentions_sample_count() {
        let (store, _) = trained_store();
        assert!(store.summary().contains("120 samples"));
    }
}
