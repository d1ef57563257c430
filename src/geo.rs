//! Geospatial primitives for zone-influence modeling
//!
//! Great-circle distances between stations and zone centers, and the
//! Gaussian decay that converts a distance into a bounded influence score.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are exactly zero.
    ///
    /// Station records without a resolved position carry (0, 0); callers
    /// substitute the assigned zone center instead of treating this as a
    /// point in the Gulf of Guinea.
    pub fn is_unset(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

/// Great-circle (haversine) distance between two coordinates in kilometers.
///
/// Symmetric and non-negative; zero for identical coordinates up to
/// floating-point noise.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Gaussian decay of a distance: `exp(-d² / (2·scale²))`.
///
/// Equals 1 at distance 0, strictly decreasing, asymptotes to 0. The scale
/// is a configuration knob: 50 km for station-to-zone influence, 30 km for
/// zone-to-zone interaction in the reference region.
pub fn gaussian_decay(distance_km: f64, scale_km: f64) -> f64 {
    (-(distance_km * distance_km) / (2.0 * scale_km * scale_km)).exp()
}
