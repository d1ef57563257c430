//! Polycentric zone model for the Rhine-Ruhr region
//!
//! Every city in the region is a zone center; a station feels each center's
//! influence through a population-weighted Gaussian decay of the distance
//! between them. Zone centers also interact pairwise (delay propagation),
//! captured by a symmetric interaction matrix with a shorter decay scale.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RegionConfig;
use crate::geo::{gaussian_decay, haversine_distance, Coordinate};

/// A fixed reference city anchoring geographic influence decay.
///
/// The zone-center set is defined once at configuration time and never
/// mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCenter {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub population: u64,
}

impl ZoneCenter {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// The eight Rhine-Ruhr zone centers of the reference deployment.
pub fn rhine_ruhr_zones() -> Vec<ZoneCenter> {
    let cities: [(&str, f64, f64, u64); 8] = [
        ("Dortmund", 51.5136, 7.4653, 588_000),
        ("Essen", 51.4556, 7.0116, 583_000),
        ("Duisburg", 51.4344, 6.7623, 498_000),
        ("Düsseldorf", 51.2277, 6.7735, 620_000),
        ("Cologne", 50.9422, 6.9581, 1_086_000),
        ("Bonn", 50.7359, 7.0999, 327_000),
        ("Bochum", 51.4818, 7.2162, 365_000),
        ("Wuppertal", 51.2562, 7.1507, 355_000),
    ];

    cities
        .into_iter()
        .map(|(name, lat, lon, population)| ZoneCenter {
            name: name.to_string(),
            lat,
            lon,
            population,
        })
        .collect()
}

/// Errors raised by zone table construction and CSV import/export.
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no zone centers configured")]
    NoZones,
    #[error("malformed interaction matrix: {0}")]
    MalformedMatrix(String),
}

/// A physical station as delivered by the (external) network collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRecord {
    pub name: String,
    pub zone_city: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl StationRecord {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// One station's influence scores against every zone center.
///
/// Derived data: rebuilt whenever coordinates or the zone set change,
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct StationInfluenceRow {
    pub station_name: String,
    pub station_city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub influences: BTreeMap<String, f64>,
}

/// Pairwise decayed interaction strengths between zone centers.
///
/// Symmetric by construction (distance is symmetric and decay depends on
/// distance only); the diagonal is fixed at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneInteractionMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl ZoneInteractionMatrix {
    /// Zone names in declaration order (both axes).
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    /// Interaction strength between two zones by name.
    pub fn strength(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[[i, j]])
    }

    /// Write the matrix as CSV with zone names on both axes.
    pub fn write_csv(&self, path: &Path) -> Result<(), ZoneError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::Writer::from_path(path)?;

        let mut header = vec!["zone".to_string()];
        header.extend(self.names.iter().cloned());
        wtr.write_record(&header)?;

        for (i, name) in self.names.iter().enumerate() {
            let mut record = vec![name.clone()];
            for j in 0..self.names.len() {
                record.push(format!("{:.6}", self.values[[i, j]]));
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read a matrix previously written by [`ZoneInteractionMatrix::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self, ZoneError> {
        let mut rdr = csv::Reader::from_path(path)?;
        let headers = rdr.headers()?.clone();
        let names: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
        if names.is_empty() {
            return Err(ZoneError::MalformedMatrix("no zone columns".to_string()));
        }

        let n = names.len();
        let mut values = Array2::zeros((n, n));
        for (i, result) in rdr.records().enumerate() {
            let record = result?;
            if i >= n || record.len() != n + 1 {
                return Err(ZoneError::MalformedMatrix(format!(
                    "row {} has {} fields, expected {}",
                    i,
                    record.len(),
                    n + 1
                )));
            }
            for j in 0..n {
                let cell = record
                    .get(j + 1)
                    .ok_or_else(|| ZoneError::MalformedMatrix(format!("missing cell ({i},{j})")))?;
                values[[i, j]] = cell.parse::<f64>().map_err(|e| {
                    ZoneError::MalformedMatrix(format!("cell ({i},{j}): {e}"))
                })?;
            }
        }
        Ok(Self { names, values })
    }
}

/// Computes decayed zone-center influence for stations and the zone
/// interaction matrix.
///
/// Holds an immutable copy of the region configuration; alternate regions or
/// decay scales are exercised by constructing a new engine.
#[derive(Debug, Clone)]
pub struct ZoneInfluenceEngine {
    region: RegionConfig,
}

impl ZoneInfluenceEngine {
    pub fn new(region: RegionConfig) -> Self {
        Self { region }
    }

    pub fn zones(&self) -> &[ZoneCenter] {
        &self.region.zone_centers
    }

    /// Influence of every zone center on a station coordinate:
    /// `decay(distance, station_scale) × population / 1e6`.
    ///
    /// Scores are independent magnitudes, deliberately not normalized into a
    /// distribution across zones.
    pub fn influence(&self, station: Coordinate) -> BTreeMap<String, f64> {
        self.region
            .zone_centers
            .iter()
            .map(|zone| {
                let dist = haversine_distance(station, zone.coordinate());
                let decay = gaussian_decay(dist, self.region.station_scale_km);
                let pop_weight = zone.population as f64 / 1_000_000.0;
                (zone.name.clone(), decay * pop_weight)
            })
            .collect()
    }

    /// Effective coordinate of a station, falling back to the assigned zone
    /// center when the record carries no position.
    ///
    /// Influence against the station's own zone is then maximal (decay = 1).
    fn station_coordinate(&self, station: &StationRecord) -> Coordinate {
        let coord = station.coordinate();
        if !coord.is_unset() {
            return coord;
        }
        self.region
            .zone_centers
            .iter()
            .find(|z| z.name == station.zone_city)
            .or_else(|| self.region.zone_centers.first())
            .map(|z| z.coordinate())
            .unwrap_or(coord)
    }

    /// Build the per-station influence table for the whole network.
    pub fn station_influence(&self, stations: &[StationRecord]) -> Vec<StationInfluenceRow> {
        stations
            .iter()
            .map(|station| {
                let coord = self.station_coordinate(station);
                StationInfluenceRow {
                    station_name: station.name.clone(),
                    station_city: station.zone_city.clone(),
                    latitude: coord.lat,
                    longitude: coord.lon,
                    influences: self.influence(coord),
                }
            })
            .collect()
    }

    /// Pairwise zone interaction strengths (decay at the interaction scale,
    /// no population weighting), diagonal fixed at zero.
    pub fn interaction_matrix(&self) -> ZoneInteractionMatrix {
        let zones = &self.region.zone_centers;
        let n = zones.len();
        let mut values = Array2::zeros((n, n));

        for (i, a) in zones.iter().enumerate() {
            for (j, b) in zones.iter().enumerate() {
                if i != j {
                    let dist = haversine_distance(a.coordinate(), b.coordinate());
                    values[[i, j]] = gaussian_decay(dist, self.region.interaction_scale_km);
                }
            }
        }

        ZoneInteractionMatrix {
            names: zones.iter().map(|z| z.name.clone()).collect(),
            values,
        }
    }

    /// Export the station influence table as a flat CSV: station identity,
    /// coordinates, then one influence column per zone in declaration order.
    pub fn write_zone_features(
        &self,
        rows: &[StationInfluenceRow],
        path: &Path,
    ) -> Result<(), ZoneError> {
        if self.region.zone_centers.is_empty() {
            return Err(ZoneError::NoZones);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::Writer::from_path(path)?;

        let mut header = vec![
            "station_name".to_string(),
            "station_city".to_string(),
            "latitude".to_string(),
            "longitude".to_string(),
        ];
        header.extend(self.region.zone_centers.iter().map(|z| z.name.clone()));
        wtr.write_record(&header)?;

        for row in rows {
            let mut record = vec![
                row.station_name.clone(),
                row.station_city.clone(),
                format!("{:.4}", row.latitude),
                format!("{:.4}", row.longitude),
            ];
            for zone in &self.region.zone_centers {
                let score = row.influences.get(&zone.name).copied().unwrap_or(0.0);
                record.push(format!("{score:.6}"));
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Load a station network CSV written by the external collector.
pub fn load_stations(path: &Path) -> Result<Vec<StationRecord>, ZoneError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut stations = Vec::new();
    for result in rdr.deserialize() {
        let record: StationRecord = result?;
        stations.push(record);
    }
    Ok(stations)
}

/// Minimal one-Hbf-per-zone station list used when no network file exists.
///
/// Coordinates are left unset so the influence engine falls back to the zone
/// centers themselves.
pub fn minimal_stations(zones: &[ZoneCenter]) -> Vec<StationRecord> {
    zones
        .iter()
        .map(|zone| StationRecord {
            name: format!("{} Hbf", zone.name),
            zone_city: zone.name.clone(),
            latitude: 0.0,
            longitude: 0.0,
        })
        .collect()
}
