//! Trip JSON documents in the format `/trips/upload` accepts.

use serde::Serialize;
use time::OffsetDateTime;
use track_device::Fix;

use crate::sources::SimulatedDrive;

fn millis(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl From<&Fix> for RoutePoint {
    fn from(fix: &Fix) -> Self {
        Self {
            latitude: fix.lat,
            longitude: fix.lon,
            timestamp: millis(fix.recorded_at),
            speed: fix.speed,
            altitude: fix.altitude,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripFile {
    pub id: String,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    /// km
    pub distance: f64,
    /// Minutes
    pub driving_time: f64,
    /// Minutes
    pub stopped_time: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub route_points: Vec<RoutePoint>,
}

impl TripFile {
    /// Summary fields come from the drive's ground truth; `fixes` may carry anomalies.
    pub fn new(id: impl Into<String>, drive: &SimulatedDrive, fixes: &[Fix]) -> Self {
        let moving_hours = drive.moving_seconds / 3600.0;
        let max_speed = fixes
            .iter()
            .filter_map(|f| f.speed)
            .fold(0.0, f64::max);

        Self {
            id: id.into(),
            start_time: drive.fixes.first().map(|f| millis(f.recorded_at)),
            end_time: drive.fixes.last().map(|f| millis(f.recorded_at)),
            distance: drive.path_km,
            driving_time: drive.moving_seconds / 60.0,
            stopped_time: drive.stopped_seconds / 60.0,
            max_speed,
            avg_speed: if moving_hours > 0.0 {
                drive.path_km / moving_hours
            } else {
                0.0
            },
            route_points: fixes.iter().map(RoutePoint::from).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
