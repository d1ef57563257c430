use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ml::PredictorConfig;
use crate::zones::{rhine_ruhr_zones, ZoneCenter};

/// Layered application configuration.
///
/// Every field has a working default, so the tool runs with no config file at
/// all; a local `config.toml`, a file in the user config directory and
/// `METRODORF__`-prefixed environment variables override in that order.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub region: RegionConfig,
    pub training: PredictorConfig,
}

/// Input and output file locations.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Training samples CSV.
    pub samples_path: PathBuf,
    /// Optional station list; zone centers stand in when absent.
    pub stations_path: Option<PathBuf>,
    /// Persisted ensemble store.
    pub model_path: PathBuf,
    /// Station influence export.
    pub zone_features_path: PathBuf,
    /// Zone interaction matrix export.
    pub interaction_matrix_path: PathBuf,
    /// Per-model test metrics export.
    pub comparison_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            samples_path: PathBuf::from("data/delays.csv"),
            stations_path: None,
            model_path: PathBuf::from("data/model.bin"),
            zone_features_path: PathBuf::from("data/zone_features.csv"),
            interaction_matrix_path: PathBuf::from("data/zone_interactions.csv"),
            comparison_path: PathBuf::from("data/model_comparison.csv"),
        }
    }
}

/// The polycentric region: zone centers and the two decay scales.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RegionConfig {
    pub zone_centers: Vec<ZoneCenter>,
    /// Decay scale for station-to-zone influence.
    pub station_scale_km: f64,
    /// Decay scale for zone-to-zone interaction strength.
    pub interaction_scale_km: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            zone_centers: rhine_ruhr_zones(),
            station_scale_km: 50.0,
            interaction_scale_km: 30.0,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("metrodorf");

        let builder = Config::builder()
            // 1. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 2. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // 3. Environment variables (METRODORF__TRAINING__SEED=...)
            .add_source(Environment::with_prefix("METRODORF").separator("__"));

        let settings = builder.build().context("failed to read configuration")?;
        settings
            .try_deserialize()
            .context("failed to parse configuration")
    }
}
