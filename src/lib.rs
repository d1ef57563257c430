//! Metrodorf Library
//!
//! Railway delay prediction for the polycentric Rhine-Ruhr network: a zone
//! influence engine over population-weighted Gaussian distance decay, and a
//! heterogeneous regression ensemble blended by validation performance.

pub mod config;
pub mod dataset;
pub mod geo;
pub mod ml;
pub mod zones;

// Re-export commonly used types
pub use config::{AppConfig, DataConfig, RegionConfig};
pub use dataset::{
    generate_samples, is_peak, load_samples, write_samples, DatasetError, TrainingSample,
};
pub use geo::{gaussian_decay, haversine_distance, Coordinate};
pub use ml::{
    DelayPredictor, EvaluationReport, FeatureBuilder, ModelStore, PredictorConfig, PredictorError,
};
pub use zones::{
    load_stations, minimal_stations, rhine_ruhr_zones, StationInfluenceRow, StationRecord,
    ZoneCenter, ZoneError, ZoneInfluenceEngine, ZoneInteractionMatrix,
};
