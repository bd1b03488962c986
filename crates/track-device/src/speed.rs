//! Per-segment speed, reported by the device or derived from position.
//!
//! One derivation serves both consumers. [`SpeedMode::Map`] returns a value
//! for every segment so the colored path has no holes; [`SpeedMode::Chart`]
//! zeroes low-confidence segments (long gaps, sub-5 m movement) so single
//! noisy fixes do not spike the chart.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    geo_math::distance_km,
    models::Fix,
    normalizer::NormalizedTrack,
    segment_metric::{self, SegmentMetric},
};

/// Longest gap, in hours, a chart speed is derived across.
pub const CHART_MAX_GAP_HOURS: f64 = 0.25;
/// Five meters.
pub const CHART_MIN_MOVEMENT_KM: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMode {
    Map,
    Chart,
}

impl SpeedMode {
    /// Ceiling display layers clamp chart speeds to. The engine never clamps.
    pub const CHART_DISPLAY_CEILING_KMH: f64 = 180.0;
}

/// Speed in km/h for the segment ending at `curr`.
pub fn segment_speed(prev: &Fix, curr: &Fix, mode: SpeedMode) -> f64 {
    if let Some(reported) = curr.speed {
        return reported;
    }

    let dt_hours = curr.seconds_since(prev) / 3600.0;
    match mode {
        SpeedMode::Map => {
            if dt_hours > 0.0 {
                distance_km(prev, curr) / dt_hours
            } else {
                0.0
            }
        }
        SpeedMode::Chart => {
            if dt_hours <= 0.0 || dt_hours >= CHART_MAX_GAP_HOURS {
                return 0.0;
            }
            let d = distance_km(prev, curr);
            if d > CHART_MIN_MOVEMENT_KM {
                d / dt_hours
            } else {
                0.0
            }
        }
    }
}

/// Collects [`segment_speed`] for every segment.
#[derive(Debug, Clone)]
pub struct SpeedSeries {
    mode: SpeedMode,
    speeds: Vec<f64>,
}

impl SpeedSeries {
    pub fn with_capacity(mode: SpeedMode, segments: usize) -> Self {
        Self {
            mode,
            speeds: Vec::with_capacity(segments),
        }
    }
}

impl SegmentMetric for SpeedSeries {
    type Output = Vec<f64>;

    fn next_segment(&mut self, _index: usize, prev: &Fix, curr: &Fix) {
        self.speeds.push(segment_speed(prev, curr, self.mode));
    }

    fn finish(self) -> Vec<f64> {
        self.speeds
    }
}

/// Speeds for segments `1..N`; element `j` belongs to segment `j + 1`.
pub fn derive_speeds(track: &NormalizedTrack, mode: SpeedMode) -> Vec<f64> {
    segment_metric::run(
        track,
        SpeedSeries::with_capacity(mode, track.segment_count()),
    )
}
