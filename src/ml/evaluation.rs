//! Metrics and the model comparison report
//!
//! R² and MAE for each bank member plus the weighted ensemble, measured on
//! the held-out test partition and exportable as a comparison CSV.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::bank::{EnsembleWeights, ModelBank, TestPartition};
use super::ensemble::EnsembleCombiner;
use super::model::{ModelError, ModelName, Regressor};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Coefficient of determination.
///
/// A zero-variance target vector has no signal to explain, so it scores 0.0
/// rather than dividing by zero.
pub fn r2_score(targets: &Array1<f64>, predictions: &Array1<f64>) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let mean = targets.mean().unwrap_or(0.0);
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return 0.0;
    }
    let ss_res: f64 = targets
        .iter()
        .zip(predictions.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(targets: &Array1<f64>, predictions: &Array1<f64>) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let total: f64 = targets
        .iter()
        .zip(predictions.iter())
        .map(|(t, p)| (t - p).abs())
        .sum();
    total / targets.len() as f64
}

/// Test-set metrics for one predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub r2: f64,
    pub mae: f64,
}

impl ModelScore {
    fn measure(targets: &Array1<f64>, predictions: &Array1<f64>) -> Self {
        Self {
            r2: r2_score(targets, predictions),
            mae: mean_absolute_error(targets, predictions),
        }
    }
}

/// One row of the exported comparison CSV.
#[derive(Debug, Serialize, Deserialize)]
struct ComparisonRow {
    model: String,
    r2: f64,
    mae: f64,
}

/// Per-model and ensemble metrics on the test partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub models: BTreeMap<ModelName, ModelScore>,
    pub ensemble: ModelScore,
}

impl EvaluationReport {
    pub fn evaluate(
        bank: &ModelBank,
        weights: &EnsembleWeights,
        partition: &TestPartition,
    ) -> Result<Self, ModelError> {
        let mut models = BTreeMap::new();
        for (name, model) in bank.iter() {
            let predictions = model.predict(&partition.features)?;
            let score = ModelScore::measure(&partition.targets, &predictions);
            info!(model = %name, r2 = score.r2, mae = score.mae, "test metrics");
            models.insert(name, score);
        }

        let blended = EnsembleCombiner::new(bank, weights).predict_batch(&partition.features)?;
        let ensemble = ModelScore::measure(&partition.targets, &blended);
        info!(r2 = ensemble.r2, mae = ensemble.mae, "ensemble test metrics");

        Ok(Self { models, ensemble })
    }

    /// One row per model plus a final `ensemble` row.
    pub fn write_csv(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for (name, score) in &self.models {
            writer.serialize(ComparisonRow {
                model: name.to_string(),
                r2: score.r2,
                mae: score.mae,
            })?;
        }
        writer.serialize(ComparisonRow {
            model: "ensemble".to_string(),
            r2: self.ensemble.r2,
            mae: self.ensemble.mae,
        })?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions_score_one() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(r2_score(&y, &y), 1.0);
        assert_relative_eq!(mean_absolute_error(&y, &y), 0.0);
    }

    #[test]
    fn test_mean_predictor_scores_zero() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![2.0, 2.0, 2.0];
        assert_relative_eq!(r2_score(&y, &p), 0.0);
    }

    #[test]
    fn test_worse_than_mean_is_negative() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![3.0, 1.0, 2.0];
        assert!(r2_score(&y, &p) < 0.0);
    }

    #[test]
    fn test_constant_targets_score_zero() {
        let y = array![4.0, 4.0, 4.0];
        let p = array![4.0, 4.0, 4.0];
        assert_relative_eq!(r2_score(&y, &p), 0.0);
    }

    #[test]
    fn test_mae_is_mean_of_absolute_errors() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![2.0, 2.0, 1.0];
        assert_relative_eq!(mean_absolute_error(&y, &p), 1.0);
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        let y = Array1::<f64>::zeros(0);
        assert_eq!(r2_score(&y, &y), 0.0);
        assert_eq!(mean_absolute_error(&y, &y), 0.0);
    }

    #[test]
    fn test_report_csv_has_model_and_ensemble_rows() {
        let mut models = BTreeMap::new();
        models.insert(ModelName::Boosted, ModelScore { r2: 0.8, mae: 1.2 });
        models.insert(ModelName::Forest, ModelScore { r2: 0.7, mae: 1.5 });
        let report = EvaluationReport {
            models,
            ensemble: ModelScore { r2: 0.85, mae: 1.1 },
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_comparison.csv");
        report.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("model,r2,mae"));
        assert!(text.contains("boosted,0.8,1.2"));
        assert!(text.contains("forest,0.7,1.5"));
        assert!(text.contains("ensemble,0.85,1.1"));
    }
}
