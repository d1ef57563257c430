//! Kernel-augmented ridge regression
//!
//! The third ensemble slot: augments the feature table with a bottleneck
//! kernel (only when a zone-interaction matrix was supplied) and a fresh
//! Gaussian distance-decay term, then fits an L2-regularized linear model.
//! The decay term is recomputed here from the raw `distance_km` column with
//! this model's own scale knob, replacing the builder's derived column in the
//! augmented view; the two scales are configured independently.
//!
//! Either augmentation is skipped quietly when its raw column is absent from
//! the table, so the model tolerates reduced feature sets.

use linfa::prelude::*;
use linfa_elasticnet::ElasticNet;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::features::FeatureTable;
use super::model::{ModelError, Regressor};
use crate::geo::gaussian_decay;
use crate::zones::ZoneInteractionMatrix;

/// Ridge hyperparameters and augmentation knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelRidgeParams {
    /// L2 penalty strength.
    pub penalty: f64,
    /// Scale of the recomputed distance-decay term.
    pub decay_scale_km: f64,
    /// Multiplier for the bottleneck kernel column.
    pub bottleneck_gain: f64,
}

impl Default for KernelRidgeParams {
    fn default() -> Self {
        Self {
            penalty: 1.0,
            decay_scale_km: 50.0,
            bottleneck_gain: 2.0,
        }
    }
}

/// Coefficients extracted after the solve, keyed to the augmented column
/// order so prediction can realign by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedRidge {
    columns: Vec<String>,
    weights: Array1<f64>,
    intercept: f64,
}

/// Ridge regression over the kernel-augmented feature table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelRidge {
    params: KernelRidgeParams,
    zone_matrix: Option<ZoneInteractionMatrix>,
    fitted: Option<FittedRidge>,
}

impl KernelRidge {
    /// The zone-interaction matrix is consumed read-only; its presence gates
    /// the bottleneck kernel.
    pub fn new(params: KernelRidgeParams, zone_matrix: Option<ZoneInteractionMatrix>) -> Self {
        Self {
            params,
            zone_matrix,
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Augmented view of a feature table. Must behave identically at fit and
    /// prediction time.
    fn augment(&self, table: &FeatureTable) -> FeatureTable {
        let mut out = table.clone();

        if self.zone_matrix.is_some() {
            if let Some(flag) = table.column("is_cologne_bottleneck") {
                let kernel = flag.mapv(|v| v * self.params.bottleneck_gain);
                out = out.with_column("cologne_kernel", kernel);
            }
        }

        if let Some(distance) = table.column("distance_km") {
            let decay = distance.mapv(|d| gaussian_decay(d, self.params.decay_scale_km));
            out = out.with_column("distance_decay", decay);
        }

        out
    }
}

impl Regressor for KernelRidge {
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

        let augmented = self.augment(features);
        let dataset = Dataset::new(augmented.records().clone(), targets.clone());

        let model = ElasticNet::params()
            .penalty(self.params.penalty)
            .l1_ratio(0.0)
            .fit(&dataset)
            .map_err(|e| ModelError::Fit(e.to_string()))?;

        self.fitted = Some(FittedRidge {
            columns: augmented.column_names().to_vec(),
            weights: model.hyperplane().clone(),
            intercept: model.intercept(),
        });
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<Array1<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let augmented = self.augment(features);

        let mut predictions = Array1::from_elem(augmented.n_rows(), fitted.intercept);
        for (weight, name) in fitted.weights.iter().zip(&fitted.columns) {
            match augmented.column(name) {
                Some(column) => predictions += &column.mapv(|v| v * weight),
                None => {
                    tracing::warn!("column {name} missing at prediction time, contributing zero")
                }
            }
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionConfig;
    use crate::dataset::TrainingSample;
    use crate::ml::features::{FeatureBuilder, FeatureVector};
    use crate::zones::ZoneInfluenceEngine;
    use ndarray::Array2;

    fn matrix() -> ZoneInteractionMatrix {
        ZoneInfluenceEngine::new(RegionConfig::default()).interaction_matrix()
    }

    fn samples(n: usize) -> Vec<TrainingSample> {
        (0..n)
            .map(|i| TrainingSample {
                distance_km: 10.0 + ((i * 13) % 90) as f64,
                time_of_day: (i % 24) as u8,
                day_of_week: (i % 7) as u8,
                is_peak_hour: i % 2 == 0,
                is_cologne_bottleneck: i % 3 == 0,
                delay_minutes: 1.0
                    + 0.08 * (10.0 + ((i * 13) % 90) as f64)
                    + if i % 2 == 0 { 2.0 } else { 0.0 }
                    + if i % 3 == 0 { 4.0 } else { 0.0 },
            })
            .collect()
    }

    #[test]
    fn test_augment_adds_kernel_when_matrix_present() {
        let (table, _) = FeatureBuilder::new(50.0).build_table(&samples(10));
        let model = KernelRidge::new(KernelRidgeParams::default(), Some(matrix()));

        let augmented = model.augment(&table);
        assert!(augmented.has_column("cologne_kernel"));
        // distance_decay is replaced in place, not duplicated
        assert_eq!(augmented.n_cols(), table.n_cols() + 1);
    }

    #[test]
    fn test_augment_skips_kernel_without_matrix() {
        let (table, _) = FeatureBuilder::new(50.0).build_table(&samples(10));
        let model = KernelRidge::new(KernelRidgeParams::default(), None);

        let augmented = model.augment(&table);
        assert!(!augmented.has_column("cologne_kernel"));
    }

    #[test]
    fn test_missing_raw_columns_degrade_gracefully() {
        // A table with neither distance_km nor the bottleneck flag
        let columns = vec!["time_of_day".to_string(), "day_of_week".to_string()];
        let data = Array2::from_shape_vec(
            (4, 2),
            vec![8.0, 1.0, 9.0, 2.0, 17.0, 3.0, 12.0, 4.0],
        )
        .unwrap();
        let table = FeatureTable::new(columns, data);
        let targets = Array1::from_vec(vec![3.0, 4.0, 6.0, 2.0]);

        let mut model = KernelRidge::new(KernelRidgeParams::default(), Some(matrix()));
        let augmented = model.augment(&table);
        assert_eq!(augmented.n_cols(), table.n_cols());

        model.fit(&table, &targets).unwrap();
        let predictions = model.predict(&table).unwrap();
        assert_eq!(predictions.len(), 4);
    }

    #[test]
    fn test_fit_and_score_on_structured_delays() {
        let samples = samples(150);
        let (table, targets) = FeatureBuilder::new(50.0).build_table(&samples);

        let mut model = KernelRidge::new(
            KernelRidgeParams {
                penalty: 0.01,
                ..KernelRidgeParams::default()
            },
            Some(matrix()),
        );
        model.fit(&table, &targets).unwrap();

        let score = model.score(&table, &targets).unwrap();
        assert!(score > 0.8, "training R² was {}", score);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let (table, _) = FeatureBuilder::new(50.0).build_table(&samples(5));
        let model = KernelRidge::new(KernelRidgeParams::default(), None);
        assert!(matches!(model.predict(&table), Err(ModelError::NotFitted)));
    }

    #[test]
    fn test_fitted_columns_cover_augmentation() {
        let (table, targets) = FeatureBuilder::new(50.0).build_table(&samples(30));
        let mut model = KernelRidge::new(KernelRidgeParams::default(), Some(matrix()));
        model.fit(&table, &targets).unwrap();

        let fitted = model.fitted.as_ref().unwrap();
        assert_eq!(fitted.columns.len(), FeatureVector::NUM_FEATURES + 1);
        assert_eq!(fitted.weights.len(), fitted.columns.len());
        assert!(fitted.columns.iter().any(|c| c == "cologne_kernel"));
    }
}
