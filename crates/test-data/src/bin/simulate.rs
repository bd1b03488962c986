//! Writes a synthetic trip JSON file for manual checks of `/trips/upload`.
//!
//! Run with:
//! ```
//! cargo run -p test-data --bin simulate -- trip.json
//! ```
//!
//! `SIM_SEED`, `SIM_DISTANCE_KM` and `SIM_CLEAN=1` tune the drive; without an
//! output path the document goes to stdout.

use std::io::Write;

use anyhow::Context;
use rand::{SeedableRng, rngs::StdRng};
use test_data::prelude::*;
use tracing_subscriber::EnvFilter;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let seed: u64 = env_or("SIM_SEED", 12345);
    let config = DriveConfig {
        distance_km: env_or("SIM_DISTANCE_KM", 15.0),
        ..Default::default()
    };
    let anomalies = if env_or("SIM_CLEAN", 0u8) == 1 {
        AnomalyConfig::none()
    } else {
        AnomalyConfig::default()
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let generator = DriveGenerator::new(config, seed as u32)?;
    let drive = generator.generate(&mut rng);
    let fixes = anomalies::inject(drive.fixes.clone(), &anomalies, &mut rng);

    let analysis = track_device::analyze(fixes.clone());
    tracing::info!("Simulated drive (seed {seed})");
    tracing::info!("  Fixes: {} ({} after normalization)", fixes.len(), analysis.normalized.len());
    tracing::info!("  Path: {:.3} km", drive.path_km);
    tracing::info!("  Measured: {:.3} km", analysis.distance_stats.total_km);
    tracing::info!(
        "  Segments: {} used, {} skipped",
        analysis.distance_stats.used_segments,
        analysis.distance_stats.skipped_segments
    );

    let json = TripFile::new(format!("sim-{seed}"), &drive, &fixes).to_json()?;
    match std::env::args().nth(1) {
        Some(path) => {
            std::fs::write(&path, &json).with_context(|| format!("writing {path}"))?;
            tracing::info!("Wrote {path}");
        }
        None => std::io::stdout().write_all(&json)?,
    }

    Ok(())
}
