//! Training sample source: CSV load/save and deterministic synthetic data
//!
//! Samples are immutable records; dataset order carries no meaning and is
//! shuffled freely by the training split.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One observed or synthetic trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    /// Trip distance in kilometers (positive).
    pub distance_km: f64,
    /// Departure hour, 0-23.
    pub time_of_day: u8,
    /// Day of week, 0 = Monday .. 6 = Sunday.
    pub day_of_week: u8,
    /// True during the morning/evening peak windows.
    pub is_peak_hour: bool,
    /// True when the trip passes the Cologne bottleneck.
    pub is_cologne_bottleneck: bool,
    /// Observed delay in minutes.
    pub delay_minutes: f64,
}

/// CSV wire format: boolean flags are stored as 0/1 integers, matching the
/// collector's export.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSample {
    distance_km: f64,
    time_of_day: u8,
    day_of_week: u8,
    is_peak_hour: u8,
    is_cologne_bottleneck: u8,
    delay_minutes: f64,
}

impl From<&TrainingSample> for RawSample {
    fn from(s: &TrainingSample) -> Self {
        Self {
            distance_km: s.distance_km,
            time_of_day: s.time_of_day,
            day_of_week: s.day_of_week,
            is_peak_hour: s.is_peak_hour as u8,
            is_cologne_bottleneck: s.is_cologne_bottleneck as u8,
            delay_minutes: s.delay_minutes,
        }
    }
}

impl From<RawSample> for TrainingSample {
    fn from(r: RawSample) -> Self {
        Self {
            distance_km: r.distance_km,
            time_of_day: r.time_of_day,
            day_of_week: r.day_of_week,
            is_peak_hour: r.is_peak_hour != 0,
            is_cologne_bottleneck: r.is_cologne_bottleneck != 0,
            delay_minutes: r.delay_minutes,
        }
    }
}

/// Errors raised by the sample source.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("sample file {0} contains no rows")]
    Empty(String),
}

/// Load training samples from a CSV file. An empty file is an error: training
/// cannot proceed without rows and should not silently produce a degenerate
/// model.
pub fn load_samples(path: &Path) -> Result<Vec<TrainingSample>, DatasetError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut samples = Vec::new();
    for result in rdr.deserialize() {
        let raw: RawSample = result?;
        samples.push(TrainingSample::from(raw));
    }
    if samples.is_empty() {
        return Err(DatasetError::Empty(path.display().to_string()));
    }
    tracing::info!("Loaded {} training samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Write training samples to CSV in the collector's column layout.
pub fn write_samples(path: &Path, samples: &[TrainingSample]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    for sample in samples {
        wtr.serialize(RawSample::from(sample))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Peak windows: 7-9 and 16-18, both inclusive.
pub fn is_peak(hour: u8) -> bool {
    (7..=9).contains(&hour) || (16..=18).contains(&hour)
}

/// Generate a deterministic synthetic dataset with realistic delay patterns.
///
/// Distances are uniform in 10-100 km, 30% of trips pass the Cologne
/// bottleneck, and delays follow an exponential base (mean 3 min) scaled up
/// by 1.5x during peaks and 2.0x through the bottleneck.
pub fn generate_samples(n: usize, seed: u64) -> Vec<TrainingSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(n);

    for _ in 0..n {
        let distance_km = rng.gen_range(10.0..100.0);
        let time_of_day: u8 = rng.gen_range(0..24);
        let day_of_week: u8 = rng.gen_range(0..7);
        let peak = is_peak(time_of_day);
        let bottleneck = rng.gen::<f64>() < 0.3;

        // Exponential base delay via inverse CDF
        let u: f64 = rng.gen();
        let base_delay = -3.0 * (1.0 - u).ln();
        let peak_factor = if peak { 1.5 } else { 0.0 };
        let bottleneck_factor = if bottleneck { 2.0 } else { 0.0 };
        let delay = base_delay * (1.0 + peak_factor + bottleneck_factor);

        samples.push(TrainingSample {
            distance_km,
            time_of_day,
            day_of_week,
            is_peak_hour: peak,
            is_cologne_bottleneck: bottleneck,
            delay_minutes: (delay * 10.0).round() / 10.0,
        });
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_windows() {
        assert!(is_peak(7));
        assert!(is_peak(9));
        assert!(is_peak(16));
        assert!(is_peak(18));
        assert!(!is_peak(10));
        assert!(!is_peak(6));
        assert!(!is_peak(19));
    }

    #[test]
    fn test_generate_samples_deterministic() {
        let a = generate_samples(50, 42);
        let b = generate_samples(50, 42);
        assert_eq!(a, b);

        let c = generate_samples(50, 7);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generated_samples_in_range() {
        for sample in generate_samples(500, 42) {
            assert!(sample.distance_km >= 10.0 && sample.distance_km < 100.0);
            assert!(sample.time_of_day < 24);
            assert!(sample.day_of_week < 7);
            assert!(sample.delay_minutes >= 0.0);
            assert_eq!(sample.is_peak_hour, is_peak(sample.time_of_day));
        }
    }

    #[test]
    fn test_bottleneck_share_roughly_30_percent() {
        let samples = generate_samples(2000, 42);
        let share = samples.iter().filter(|s| s.is_cologne_bottleneck).count() as f64
            / samples.len() as f64;
        assert!(share > 0.22 && share < 0.38, "share was {}", share);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("training_data.csv");

        let samples = generate_samples(20, 42);
        write_samples(&path, &samples).unwrap();
        let loaded = load_samples(&path).unwrap();

        assert_eq!(loaded.len(), samples.len());
        assert_eq!(loaded[0].is_peak_hour, samples[0].is_peak_hour);
        assert_eq!(loaded[7].is_cologne_bottleneck, samples[7].is_cologne_bottleneck);
    }

    #[test]
    fn test_empty_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(
            &path,
            "distance_km,time_of_day,day_of_week,is_peak_hour,is_cologne_bottleneck,delay_minutes\n",
        )
        .unwrap();

        let result = load_samples(&path);
        assert!(matches!(result, Err(DatasetError::Empty(_))));
    }
}
