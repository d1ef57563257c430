//! Feature construction for delay prediction
//!
//! Converts raw trip samples into the augmented feature vectors consumed by
//! the model bank. The same construction runs at training time and at
//! single-trip inference time; the two paths share one code path so they can
//! never diverge.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::dataset::TrainingSample;
use crate::geo::gaussian_decay;

/// Features derived for a single trip.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub distance_km: f64,
    pub time_of_day: f64,
    pub day_of_week: f64,
    pub is_peak_hour: f64,
    pub is_cologne_bottleneck: f64,

    // Derived polycentric terms
    pub cologne_effect: f64,
    pub peak_effect: f64,
    pub distance_decay: f64,
    pub cologne_peak_interaction: f64,
}

impl FeatureVector {
    /// Number of features.
    pub const NUM_FEATURES: usize = 9;

    /// Column names in vector order.
    pub const COLUMNS: [&'static str; Self::NUM_FEATURES] = [
        "distance_km",
        "time_of_day",
        "day_of_week",
        "is_peak_hour",
        "is_cologne_bottleneck",
        "cologne_effect",
        "peak_effect",
        "distance_decay",
        "cologne_peak_interaction",
    ];

    /// Convert to a flat vector for the models.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.distance_km,
            self.time_of_day,
            self.day_of_week,
            self.is_peak_hour,
            self.is_cologne_bottleneck,
            self.cologne_effect,
            self.peak_effect,
            self.distance_decay,
            self.cologne_peak_interaction,
        ]
    }
}

/// A feature matrix with named columns.
///
/// Models look up raw columns by name so that augmentation steps can degrade
/// gracefully when a column is absent, instead of indexing blindly.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl FeatureTable {
    /// Build a table from named columns and row-major data.
    ///
    /// # Panics
    /// Panics when the data width does not match the column count; tables are
    /// only constructed from code that controls both.
    pub fn new(columns: Vec<String>, data: Array2<f64>) -> Self {
        assert_eq!(columns.len(), data.ncols(), "column/data width mismatch");
        Self { columns, data }
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// View of a column by name.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.data.column(idx))
    }

    /// The underlying row-major matrix.
    pub fn records(&self) -> &Array2<f64> {
        &self.data
    }

    /// Copy of the table restricted to the given row indices.
    pub fn select_rows(&self, rows: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self.columns.clone(),
            data: self.data.select(Axis(0), rows),
        }
    }

    /// Table with `values` stored under `name`, replacing an existing column
    /// of that name or appending a new one.
    pub fn with_column(&self, name: &str, values: Array1<f64>) -> FeatureTable {
        assert_eq!(values.len(), self.n_rows(), "column length mismatch");

        if let Some(idx) = self.columns.iter().position(|c| c == name) {
            let mut data = self.data.clone();
            data.column_mut(idx).assign(&values);
            return FeatureTable {
                columns: self.columns.clone(),
                data,
            };
        }

        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let mut data = Array2::zeros((self.n_rows(), self.n_cols() + 1));
        data.slice_mut(ndarray::s![.., ..self.n_cols()])
            .assign(&self.data);
        data.column_mut(self.n_cols()).assign(&values);
        FeatureTable { columns, data }
    }
}

/// Builds feature vectors and tables from raw trips.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    decay_scale_km: f64,
}

impl FeatureBuilder {
    pub fn new(decay_scale_km: f64) -> Self {
        Self { decay_scale_km }
    }

    /// Derive the feature vector for one trip. Both the batch training path
    /// and single-trip inference go through here.
    pub fn features(
        &self,
        distance_km: f64,
        time_of_day: u8,
        day_of_week: u8,
        is_peak_hour: bool,
        is_cologne_bottleneck: bool,
    ) -> FeatureVector {
        let peak = if is_peak_hour { 1.0 } else { 0.0 };
        let bottleneck = if is_cologne_bottleneck { 1.0 } else { 0.0 };

        let cologne_effect = bottleneck * 2.0;
        let peak_effect = peak * 1.5;

        FeatureVector {
            distance_km,
            time_of_day: time_of_day as f64,
            day_of_week: day_of_week as f64,
            is_peak_hour: peak,
            is_cologne_bottleneck: bottleneck,
            cologne_effect,
            peak_effect,
            distance_decay: gaussian_decay(distance_km, self.decay_scale_km),
            cologne_peak_interaction: cologne_effect * peak_effect,
        }
    }

    pub fn from_sample(&self, sample: &TrainingSample) -> FeatureVector {
        self.features(
            sample.distance_km,
            sample.time_of_day,
            sample.day_of_week,
            sample.is_peak_hour,
            sample.is_cologne_bottleneck,
        )
    }

    /// Build the full feature table and target vector for a sample set.
    pub fn build_table(&self, samples: &[TrainingSample]) -> (FeatureTable, Array1<f64>) {
        let flat: Vec<f64> = samples
            .iter()
            .flat_map(|s| self.from_sample(s).to_vec())
            .collect();
        let data = Array2::from_shape_vec((samples.len(), FeatureVector::NUM_FEATURES), flat)
            .unwrap_or_else(|_| Array2::zeros((0, FeatureVector::NUM_FEATURES)));
        let targets = Array1::from_iter(samples.iter().map(|s| s.delay_minutes));

        (
            FeatureTable::new(
                FeatureVector::COLUMNS.iter().map(|c| c.to_string()).collect(),
                data,
            ),
            targets,
        )
    }

    /// Single-row table for inference, with identical columns to the batch
    /// path.
    pub fn single_row(
        &self,
        distance_km: f64,
        time_of_day: u8,
        day_of_week: u8,
        is_peak_hour: bool,
        is_cologne_bottleneck: bool,
    ) -> FeatureTable {
        let vector = self.features(
            distance_km,
            time_of_day,
            day_of_week,
            is_peak_hour,
            is_cologne_bottleneck,
        );
        let data = Array2::from_shape_vec((1, FeatureVector::NUM_FEATURES), vector.to_vec())
            .unwrap_or_else(|_| Array2::zeros((1, FeatureVector::NUM_FEATURES)));
        FeatureTable::new(
            FeatureVector::COLUMNS.iter().map(|c| c.to_string()).collect(),
            data,
        )
    }
}
