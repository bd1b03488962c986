//! Procedural vehicle drive generation.

use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use time::{Duration, OffsetDateTime, macros::datetime};
use track_device::{Fix, geo_math::distance_km};

use crate::config::{BoundingBox, Region};
use crate::terrain::ElevationGenerator;

/// Meters per degree of latitude, close enough for step sizing.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Fixes cannot be closer than this or the normalizer would drop them.
const MIN_FIX_INTERVAL_SECONDS: f64 = 3.0;

#[derive(Debug, thiserror::Error)]
pub enum DriveConfigError {
    #[error("invalid distribution parameter: {0}")]
    Distribution(#[from] NormalError),
    #[error("fix interval must be at least {MIN_FIX_INTERVAL_SECONDS}s, got {0}")]
    FixInterval(f64),
    #[error("distance must be positive, got {0}")]
    Distance(f64),
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Target driven distance in km.
    pub distance_km: f64,
    /// Starting point (lat, lon). If None, random within bounds.
    pub start_point: Option<(f64, f64)>,
    pub start_time: OffsetDateTime,
    pub bounds: BoundingBox,
    /// Mean seconds between fixes; each interval varies by ±20%.
    pub fix_interval_s: f64,
    pub cruise_speed_kmh: f64,
    pub speed_std_kmh: f64,
    /// GPS position noise standard deviation in meters.
    pub gps_jitter_m: f64,
    /// Chance per fix of pulling over.
    pub stop_probability: f64,
    /// Duration range for stops (min, max) in seconds.
    pub stop_duration_range: (f64, f64),
    /// Fraction of fixes that carry a device-reported speed.
    pub reported_speed_fraction: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            distance_km: 15.0,
            start_point: None,
            start_time: datetime!(2024-03-01 12:00:00 UTC),
            bounds: Region::BUENOS_AIRES,
            fix_interval_s: 10.0,
            cruise_speed_kmh: 45.0,
            speed_std_kmh: 12.0,
            gps_jitter_m: 3.0,
            stop_probability: 0.03,
            stop_duration_range: (30.0, 240.0),
            reported_speed_fraction: 0.3,
        }
    }
}

/// A generated drive and the ground truth it was generated from.
#[derive(Debug, Clone)]
pub struct SimulatedDrive {
    /// Time-ordered fixes as a device would report them
    pub fixes: Vec<Fix>,
    /// Length of the noise-free path in km
    pub path_km: f64,
    pub moving_seconds: f64,
    pub stopped_seconds: f64,
}

/// Generates synthetic drives as a random walk with momentum.
#[derive(Debug, Clone)]
pub struct DriveGenerator {
    config: DriveConfig,
    elevation: ElevationGenerator,
    speed: Normal<f64>,
    jitter: Normal<f64>,
    altitude_jitter: Normal<f64>,
}

impl DriveGenerator {
    pub fn new(config: DriveConfig, seed: u32) -> Result<Self, DriveConfigError> {
        if config.fix_interval_s < MIN_FIX_INTERVAL_SECONDS {
            return Err(DriveConfigError::FixInterval(config.fix_interval_s));
        }
        if !(config.distance_km > 0.0) {
            return Err(DriveConfigError::Distance(config.distance_km));
        }

        let elevation = if config.bounds == Region::MENDOZA {
            ElevationGenerator::cuyo(seed)
        } else {
            ElevationGenerator::pampas(seed)
        };

        Ok(Self {
            speed: Normal::new(config.cruise_speed_kmh, config.speed_std_kmh)?,
            jitter: Normal::new(0.0, config.gps_jitter_m / METERS_PER_DEGREE)?,
            altitude_jitter: Normal::new(0.0, 2.0)?,
            config,
            elevation,
        })
    }

    pub fn with_elevation(mut self, elevation: ElevationGenerator) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn generate(&self, rng: &mut impl Rng) -> SimulatedDrive {
        let cfg = &self.config;
        let mut position = cfg
            .start_point
            .unwrap_or_else(|| cfg.bounds.random_point(rng));
        let mut heading = rng.gen_range(0.0..std::f64::consts::TAU);
        let mut timestamp = cfg.start_time;

        let mut drive = SimulatedDrive {
            fixes: vec![self.observe(position, timestamp, 0.0, rng)],
            path_km: 0.0,
            moving_seconds: 0.0,
            stopped_seconds: 0.0,
        };

        while drive.path_km < cfg.distance_km {
            if rng.r#gen::<f64>() < cfg.stop_probability {
                let (min, max) = cfg.stop_duration_range;
                let stop_end = timestamp + Duration::seconds_f64(rng.gen_range(min..max));
                loop {
                    let dt = self.next_interval(rng);
                    if timestamp + Duration::seconds_f64(dt) > stop_end {
                        break;
                    }
                    timestamp += Duration::seconds_f64(dt);
                    drive.stopped_seconds += dt;
                    drive.fixes.push(self.observe(position, timestamp, 0.0, rng));
                }
            }

            let dt = self.next_interval(rng);
            let speed_kmh = self.speed.sample(rng).max(5.0);
            let step_m = speed_kmh / 3.6 * dt;

            heading += rng.gen_range(-0.25..0.25);
            let lat_delta = step_m * heading.cos() / METERS_PER_DEGREE;
            let lon_delta =
                step_m * heading.sin() / (METERS_PER_DEGREE * position.0.to_radians().cos());
            let (lat, lon, bounced) =
                self.apply_bounds(position.0 + lat_delta, position.1 + lon_delta, heading);
            heading = bounced;

            let next = (lat, lon);
            drive.path_km += distance_km(&position, &next);
            position = next;
            timestamp += Duration::seconds_f64(dt);
            drive.moving_seconds += dt;
            drive
                .fixes
                .push(self.observe(position, timestamp, speed_kmh, rng));
        }

        tracing::debug!(
            fixes = drive.fixes.len(),
            path_km = drive.path_km,
            "Generated drive"
        );
        drive
    }

    fn next_interval(&self, rng: &mut impl Rng) -> f64 {
        (self.config.fix_interval_s * rng.gen_range(0.8..1.2)).max(MIN_FIX_INTERVAL_SECONDS)
    }

    /// What the device reports for a true position.
    fn observe(
        &self,
        (lat, lon): (f64, f64),
        recorded_at: OffsetDateTime,
        speed_kmh: f64,
        rng: &mut impl Rng,
    ) -> Fix {
        let mut fix = Fix::new(
            lat + self.jitter.sample(rng),
            lon + self.jitter.sample(rng),
            recorded_at,
        )
        .with_altitude(self.elevation.elevation_at(lat, lon) + self.altitude_jitter.sample(rng));

        if rng.r#gen::<f64>() < self.config.reported_speed_fraction {
            fix = fix.with_speed((speed_kmh * rng.gen_range(0.95..1.05)).max(0.0));
        }
        fix
    }

    /// Keeps the walk inside the bounds by reflecting the heading.
    fn apply_bounds(&self, lat: f64, lon: f64, heading: f64) -> (f64, f64, f64) {
        let b = &self.config.bounds;
        let mut new_heading = heading;

        let lat = if lat < b.min_lat {
            new_heading = std::f64::consts::PI - heading;
            b.min_lat + (b.min_lat - lat).min(0.001)
        } else if lat > b.max_lat {
            new_heading = std::f64::consts::PI - heading;
            b.max_lat - (lat - b.max_lat).min(0.001)
        } else {
            lat
        };

        let lon = if lon < b.min_lon {
            new_heading = -heading;
            b.min_lon + (b.min_lon - lon).min(0.001)
        } else if lon > b.max_lon {
            new_heading = -heading;
            b.max_lon - (lon - b.max_lon).min(0.001)
        } else {
            lon
        };

        (lat, lon, new_heading)
    }
}
