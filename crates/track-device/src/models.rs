use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset, macros::format_description};
use utoipa::ToSchema;

use crate::normalizer::NormalizedTrack;
use crate::speed_classifier::SpeedBand;

/// One GPS observation as handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Fix {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub recorded_at: OffsetDateTime,
    /// Device-reported speed in km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Altitude in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Fix {
    pub fn new(lat: f64, lon: f64, recorded_at: OffsetDateTime) -> Self {
        Self {
            lat,
            lon,
            recorded_at,
            speed: None,
            altitude: None,
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed = Some(speed_kmh);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Seconds elapsed from `earlier` to `self`. Negative when `earlier` is newer.
    pub fn seconds_since(&self, earlier: &Fix) -> f64 {
        (self.recorded_at - earlier.recorded_at).as_seconds_f64()
    }

    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }

    /// Reject out-of-range coordinates and drop unusable optional readings.
    ///
    /// Collaborators call this when mapping external records; the engine
    /// itself assumes valid degrees.
    pub fn sanitized(mut self) -> Option<Self> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lon_ok = self.lon.is_finite() && (-180.0..=180.0).contains(&self.lon);
        if !lat_ok || !lon_ok {
            return None;
        }
        self.speed = self.speed.filter(|s| s.is_finite() && *s >= 0.0);
        self.altitude = self.altitude.filter(|a| a.is_finite());
        Some(self)
    }
}

/// Aggregate distance over a normalized track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DistanceStats {
    pub total_km: f64,
    pub used_segments: u32,
    pub skipped_segments: u32,
    /// Gap ceiling the stats were computed with
    pub max_gap_seconds: i64,
    /// Speed ceiling the stats were computed with
    pub max_speed_kmh: f64,
}

/// Speed and severity band for one map path segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpeedColorSample {
    pub segment_index: usize,
    pub speed_kmh: f64,
    pub color: SpeedBand,
}

/// One sample of the speed-over-time chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChartPoint {
    pub segment_index: usize,
    /// Timestamp of the segment's end fix
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub recorded_at: OffsetDateTime,
    pub speed_kmh: f64,
}

impl ChartPoint {
    /// Hour and minute of the sample in the given offset, e.g. `"14:05"`.
    pub fn time_label(&self, offset: UtcOffset) -> String {
        self.recorded_at
            .to_offset(offset)
            .format(format_description!("[hour]:[minute]"))
            .unwrap_or_default()
    }
}

/// Geographic bounds for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Everything derived from one input sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackAnalysis {
    pub normalized: NormalizedTrack,
    pub distance_stats: DistanceStats,
    pub map_speed_colors: Vec<SpeedColorSample>,
    pub chart_speeds: Vec<ChartPoint>,
    pub bounds: Option<TrackBounds>,
}
