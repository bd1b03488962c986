//! Total distance over a normalized track with noise and outlier rejection.
//!
//! Each segment passes three independent gates:
//! - time: non-monotonic timestamps or silences longer than
//!   [`DistanceLimits::max_gap_seconds`] are skipped
//! - speed: jumps faster than [`DistanceLimits::max_speed_kmh`] are skipped
//! - movement: plausible segments of [`MIN_MOVEMENT_KM`] or less are stationary
//!   jitter, neither summed nor counted

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    geo_math::distance_km,
    models::{DistanceStats, Fix},
    normalizer::NormalizedTrack,
    segment_metric::{self, SegmentMetric},
};

pub const DEFAULT_MAX_SPEED_KMH: f64 = 180.0;
/// Four hours.
pub const DEFAULT_MAX_GAP_SECONDS: i64 = 14_400;
/// Ten meters.
pub const MIN_MOVEMENT_KM: f64 = 0.01;

/// Plausibility ceilings for distance aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DistanceLimits {
    #[serde(default = "default_max_speed_kmh")]
    pub max_speed_kmh: f64,
    #[serde(default = "default_max_gap_seconds")]
    pub max_gap_seconds: i64,
}

fn default_max_speed_kmh() -> f64 {
    DEFAULT_MAX_SPEED_KMH
}

fn default_max_gap_seconds() -> i64 {
    DEFAULT_MAX_GAP_SECONDS
}

impl Default for DistanceLimits {
    fn default() -> Self {
        Self {
            max_speed_kmh: DEFAULT_MAX_SPEED_KMH,
            max_gap_seconds: DEFAULT_MAX_GAP_SECONDS,
        }
    }
}

impl DistanceLimits {
    pub fn zero_stats(&self) -> DistanceStats {
        DistanceStats {
            total_km: 0.0,
            used_segments: 0,
            skipped_segments: 0,
            max_gap_seconds: self.max_gap_seconds,
            max_speed_kmh: self.max_speed_kmh,
        }
    }
}

/// Why a segment was left out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Timestamp did not advance
    NonMonotonic,
    /// Device was silent longer than the gap ceiling
    Gap,
    /// Implied speed above the ceiling
    Implausible,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentOutcome {
    /// Counted, with its distance in km
    Used(f64),
    Skipped(SkipReason),
    /// Sub-threshold movement at a plausible speed
    Stationary,
}

/// Run one segment through the time, speed and movement gates.
pub fn classify_segment(prev: &Fix, curr: &Fix, limits: &DistanceLimits) -> SegmentOutcome {
    let dt = curr.seconds_since(prev);
    if dt <= 0.0 {
        return SegmentOutcome::Skipped(SkipReason::NonMonotonic);
    }
    if dt > limits.max_gap_seconds as f64 {
        return SegmentOutcome::Skipped(SkipReason::Gap);
    }

    let d = distance_km(prev, curr);
    let speed = d / (dt / 3600.0);

    if speed > limits.max_speed_kmh {
        SegmentOutcome::Skipped(SkipReason::Implausible)
    } else if d > MIN_MOVEMENT_KM {
        SegmentOutcome::Used(d)
    } else {
        SegmentOutcome::Stationary
    }
}

/// Running totals for [`aggregate`].
#[derive(Debug, Clone)]
pub struct DistanceMetric {
    limits: DistanceLimits,
    stats: DistanceStats,
}

impl DistanceMetric {
    pub fn new(limits: DistanceLimits) -> Self {
        Self {
            limits,
            stats: limits.zero_stats(),
        }
    }
}

impl SegmentMetric for DistanceMetric {
    type Output = DistanceStats;

    fn next_segment(&mut self, index: usize, prev: &Fix, curr: &Fix) {
        match classify_segment(prev, curr, &self.limits) {
            SegmentOutcome::Used(km) => {
                self.stats.total_km += km;
                self.stats.used_segments += 1;
            }
            SegmentOutcome::Skipped(reason) => {
                tracing::trace!(segment = index, ?reason, "Skipped segment");
                self.stats.skipped_segments += 1;
            }
            SegmentOutcome::Stationary => {}
        }
    }

    fn finish(self) -> DistanceStats {
        self.stats
    }
}

/// Total distance and used/skipped segment counts for a normalized track.
pub fn aggregate(track: &NormalizedTrack, limits: DistanceLimits) -> DistanceStats {
    if track.len() < 2 {
        return limits.zero_stats();
    }
    segment_metric::run(track, DistanceMetric::new(limits))
}
