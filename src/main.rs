use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrodorf::config::AppConfig;
use metrodorf::dataset::{self, is_peak};
use metrodorf::ml::DelayPredictor;
use metrodorf::zones::{load_stations, minimal_stations, ZoneInfluenceEngine};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "metrodorf")]
#[command(about = "Railway delay prediction for the Rhine-Ruhr network")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export the station influence table and the zone interaction matrix
    Zones,
    /// Train the delay ensemble and write the model comparison report
    Train {
        /// Generate N synthetic samples instead of reading the samples CSV
        #[arg(long, value_name = "N")]
        synthetic: Option<usize>,
    },
    /// Estimate the delay for a single trip using the saved model
    Predict {
        /// Trip distance in kilometers
        #[arg(long)]
        distance_km: f64,
        /// Departure hour (0-23)
        #[arg(long)]
        hour: u8,
        /// Weekday, 0 = Monday
        #[arg(long, default_value_t = 2)]
        weekday: u8,
        /// Override the peak-hour flag (derived from the hour when omitted)
        #[arg(long)]
        peak: Option<bool>,
        /// Trip passes through the Cologne bottleneck
        #[arg(long, default_value_t = false)]
        bottleneck: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("metrodorf=debug");
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    match args.command {
        Command::Zones => run_zones(&config),
        Command::Train { synthetic } => run_train(&config, synthetic),
        Command::Predict {
            distance_km,
            hour,
            weekday,
            peak,
            bottleneck,
        } => run_predict(&config, distance_km, hour, weekday, peak, bottleneck),
    }
}

/// Write the zone feature exports for the configured station network.
fn run_zones(config: &AppConfig) -> Result<()> {
    let engine = ZoneInfluenceEngine::new(config.region.clone());

    let stations = match &config.data.stations_path {
        Some(path) => load_stations(path)
            .with_context(|| format!("Failed to read stations from {}", path.display()))?,
        None => minimal_stations(engine.zones()),
    };

    let rows = engine.station_influence(&stations);
    engine.write_zone_features(&rows, &config.data.zone_features_path)?;
    tracing::info!(
        stations = rows.len(),
        path = %config.data.zone_features_path.display(),
        "wrote station influence table"
    );

    let matrix = engine.interaction_matrix();
    matrix.write_csv(&config.data.interaction_matrix_path)?;
    tracing::info!(
        zones = matrix.len(),
        path = %config.data.interaction_matrix_path.display(),
        "wrote zone interaction matrix"
    );

    Ok(())
}

/// Train on real or synthetic samples, report test metrics and persist.
fn run_train(config: &AppConfig, synthetic: Option<usize>) -> Result<()> {
    let samples = match synthetic {
        Some(n) => {
            let samples = dataset::generate_samples(n, config.training.training.seed);
            dataset::write_samples(&config.data.samples_path, &samples)
                .context("Failed to write synthetic samples")?;
            tracing::info!(
                n,
                path = %config.data.samples_path.display(),
                "generated synthetic samples"
            );
            samples
        }
        None => dataset::load_samples(&config.data.samples_path).with_context(|| {
            format!(
                "Failed to load samples from {}",
                config.data.samples_path.display()
            )
        })?,
    };

    let engine = ZoneInfluenceEngine::new(config.region.clone());
    let mut predictor = DelayPredictor::new(config.training, Some(engine.interaction_matrix()));

    let partition = predictor.train(&samples)?;
    let report = predictor.evaluate(&partition)?;
    report.write_csv(&config.data.comparison_path)?;

    for (name, score) in &report.models {
        println!("{name:>12}  R2 {:+.3}  MAE {:.2} min", score.r2, score.mae);
    }
    println!(
        "{:>12}  R2 {:+.3}  MAE {:.2} min",
        "ensemble", report.ensemble.r2, report.ensemble.mae
    );

    predictor.save(&config.data.model_path)?;
    tracing::info!(path = %config.data.model_path.display(), "model saved");
    Ok(())
}

/// Single-trip delay estimate from the persisted ensemble.
fn run_predict(
    config: &AppConfig,
    distance_km: f64,
    hour: u8,
    weekday: u8,
    peak: Option<bool>,
    bottleneck: bool,
) -> Result<()> {
    anyhow::ensure!(hour < 24, "hour must be between 0 and 23");
    anyhow::ensure!(weekday < 7, "weekday must be between 0 and 6");
    anyhow::ensure!(distance_km >= 0.0, "distance must be non-negative");

    let engine = ZoneInfluenceEngine::new(config.region.clone());
    let predictor = DelayPredictor::load(
        &config.data.model_path,
        config.training,
        Some(engine.interaction_matrix()),
    )
    .context("No trained model found, run `metrodorf train` first")?;

    let peak = peak.unwrap_or_else(|| is_peak(hour));
    let delay = predictor.predict_one(distance_km, hour, weekday, peak, bottleneck)?;
    println!("Estimated delay: {delay:.1} min");
    Ok(())
}
