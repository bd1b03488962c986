//! Uploaded trip parsers for the JSON trip format and GPX.
//!
//! Both formats map to [`Fix`]. Records that cannot be mapped (missing or
//! non-numeric coordinates, unparsable timestamps) are dropped here with a
//! warning so the engine only ever sees well-formed fixes.

use axum_extra::headers::Mime;
use bytes::{Buf as _, Bytes};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::models::Fix;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Json,
    Gpx,
    Other,
}

impl From<Mime> for FileType {
    fn from(mime: Mime) -> Self {
        match (mime.type_().as_str(), mime.subtype().as_str()) {
            ("application", "json") => FileType::Json,
            // application/gpx+xml has subtype "gpx"
            ("application", "gpx") => FileType::Gpx,
            ("application", "xml") | ("text", "xml") => FileType::Gpx,
            (t, s) => {
                tracing::warn!("Unknown mime type: {}/{}", t, s);
                FileType::Other
            }
        }
    }
}

impl FileType {
    /// Guess the format from the leading bytes.
    pub fn detect_from_bytes(bytes: &[u8]) -> FileType {
        let head = &bytes[..bytes.len().min(512)];
        let text = String::from_utf8_lossy(head);
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();

        if trimmed.starts_with('{') {
            FileType::Json
        } else if trimmed.contains("<gpx") {
            FileType::Gpx
        } else {
            FileType::Other
        }
    }

    pub fn as_mime_str(self) -> &'static str {
        match self {
            FileType::Json => "application/json",
            FileType::Gpx => "application/gpx+xml",
            FileType::Other => "application/octet-stream",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid trip file: {0}")]
    InvalidTripFile(String),
    #[error("Failed to parse GPX file: {0}")]
    Gpx(String),
    #[error("Unsupported file type: {0:?}")]
    UnsupportedFileType(FileType),
}

/// Optional trip metadata carried alongside the route points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct TripSummary {
    pub id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub end_time: Option<OffsetDateTime>,
    /// Distance reported by the recording device, km
    pub distance_km: Option<f64>,
    /// Minutes
    pub driving_time_min: Option<f64>,
    /// Minutes
    pub stopped_time_min: Option<f64>,
    pub max_speed_kmh: Option<f64>,
    pub avg_speed_kmh: Option<f64>,
}

/// Result of parsing an uploaded trip
#[derive(Debug, Clone)]
pub struct ParsedTrip {
    pub fixes: Vec<Fix>,
    pub summary: TripSummary,
    /// Records that could not be mapped to a fix
    pub discarded: usize,
}

/// Parse an uploaded trip. `FileType::Other` is sniffed from the bytes.
pub fn parse_trip_file(file_type: FileType, bytes: Bytes) -> Result<ParsedTrip, ParseError> {
    let actual_type = if file_type == FileType::Other {
        FileType::detect_from_bytes(&bytes)
    } else {
        file_type
    };

    match actual_type {
        FileType::Json => parse_trip_json(&bytes),
        FileType::Gpx => parse_gpx(bytes),
        FileType::Other => Err(ParseError::UnsupportedFileType(actual_type)),
    }
}

/// Either an RFC 3339 string or epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TimestampValue {
    Millis(f64),
    Text(String),
}

impl TimestampValue {
    fn to_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            TimestampValue::Millis(ms) if ms.is_finite() => {
                let nanos = (ms.round() as i128).checked_mul(1_000_000)?;
                OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
            }
            TimestampValue::Millis(_) => None,
            TimestampValue::Text(s) => {
                OffsetDateTime::parse(s.trim(), &time::format_description::well_known::Rfc3339)
                    .ok()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripDocument {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    route_points: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    start_time: Option<TimestampValue>,
    #[serde(default)]
    end_time: Option<TimestampValue>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    driving_time: Option<f64>,
    #[serde(default)]
    stopped_time: Option<f64>,
    #[serde(default)]
    max_speed: Option<f64>,
    #[serde(default)]
    avg_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RoutePoint {
    latitude: f64,
    longitude: f64,
    timestamp: TimestampValue,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    altitude: Option<f64>,
}

impl RoutePoint {
    fn to_fix(&self) -> Option<Fix> {
        let recorded_at = self.timestamp.to_datetime()?;
        Fix {
            lat: self.latitude,
            lon: self.longitude,
            recorded_at,
            speed: self.speed,
            altitude: self.altitude,
        }
        .sanitized()
    }
}

/// Parse the JSON trip format (`routePoints` plus optional summary fields).
pub fn parse_trip_json(bytes: &[u8]) -> Result<ParsedTrip, ParseError> {
    let doc: TripDocument = serde_json::from_slice(bytes)?;

    let Some(route_points) = doc.route_points else {
        return Err(ParseError::InvalidTripFile(
            "missing routePoints list".to_string(),
        ));
    };

    let mut fixes = Vec::with_capacity(route_points.len());
    let mut discarded = 0;
    for (idx, raw) in route_points.into_iter().enumerate() {
        let fix = serde_json::from_value::<RoutePoint>(raw)
            .ok()
            .and_then(|p| p.to_fix());
        match fix {
            Some(fix) => fixes.push(fix),
            None => {
                tracing::warn!("Discarding malformed route point {idx}");
                discarded += 1;
            }
        }
    }

    let id = doc.id.and_then(|v| match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    });

    let summary = TripSummary {
        id,
        start_time: doc.start_time.as_ref().and_then(TimestampValue::to_datetime),
        end_time: doc.end_time.as_ref().and_then(TimestampValue::to_datetime),
        distance_km: doc.distance,
        driving_time_min: doc.driving_time,
        stopped_time_min: doc.stopped_time,
        max_speed_kmh: doc.max_speed,
        avg_speed_kmh: doc.avg_speed,
    };

    Ok(ParsedTrip {
        fixes,
        summary,
        discarded,
    })
}

/// Parse a GPX file. Track points without a timestamp cannot be placed in
/// time and are discarded.
pub fn parse_gpx(bytes: Bytes) -> Result<ParsedTrip, ParseError> {
    let gpx = gpx::read(bytes.reader()).map_err(|e| ParseError::Gpx(e.to_string()))?;

    let mut fixes = Vec::new();
    let mut discarded = 0;

    for track in &gpx.tracks {
        for seg in &track.segments {
            for pt in &seg.points {
                let Some(time) = pt.time else {
                    discarded += 1;
                    continue;
                };
                let fix = Fix {
                    lat: pt.point().y(),
                    lon: pt.point().x(),
                    recorded_at: time.into(),
                    // GPX speed is m/s
                    speed: pt.speed.map(|mps| mps * 3.6),
                    altitude: pt.elevation,
                }
                .sanitized();

                match fix {
                    Some(fix) => fixes.push(fix),
                    None => discarded += 1,
                }
            }
        }
    }

    if discarded > 0 {
        tracing::warn!("Discarded {discarded} GPX track points without usable time or position");
    }

    let id = gpx
        .metadata
        .as_ref()
        .and_then(|m| m.name.clone())
        .or_else(|| gpx.tracks.iter().find_map(|t| t.name.clone()));

    let summary = TripSummary {
        id,
        start_time: fixes.iter().map(|f| f.recorded_at).min(),
        end_time: fixes.iter().map(|f| f.recorded_at).max(),
        ..Default::default()
    };

    Ok(ParsedTrip {
        fixes,
        summary,
        discarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const TRIP_JSON: &str = r#"{
        "id": 4711,
        "startTime": "2024-03-01T12:00:00Z",
        "endTime": 1709295000000,
        "distance": 12.5,
        "drivingTime": 20,
        "stoppedTime": 3,
        "maxSpeed": 88,
        "avgSpeed": 41.2,
        "routePoints": [
            {"latitude": -34.6037, "longitude": -58.3816, "timestamp": "2024-03-01T12:00:00Z", "speed": 0},
            {"latitude": -34.6040, "longitude": -58.3820, "timestamp": 1709294460000, "altitude": 25.0},
            {"latitude": "oops", "longitude": -58.3820, "timestamp": "2024-03-01T12:02:00Z"},
            {"latitude": -34.6050, "longitude": -58.3830, "timestamp": "yesterday"},
            {"latitude": -34.6060, "longitude": -58.3840, "timestamp": "2024-03-01T12:03:00-03:00"}
        ]
    }"#;

    #[test]
    fn test_parse_trip_json() {
        let trip = parse_trip_json(TRIP_JSON.as_bytes()).unwrap();

        assert_eq!(trip.fixes.len(), 3);
        assert_eq!(trip.discarded, 2);

        assert_eq!(trip.fixes[0].speed, Some(0.0));
        assert_eq!(trip.fixes[1].recorded_at, datetime!(2024-03-01 12:01:00 UTC));
        assert_eq!(trip.fixes[1].altitude, Some(25.0));
        assert_eq!(trip.fixes[2].recorded_at, datetime!(2024-03-01 15:03:00 UTC));

        assert_eq!(trip.summary.id.as_deref(), Some("4711"));
        assert_eq!(trip.summary.start_time, Some(datetime!(2024-03-01 12:00:00 UTC)));
        assert_eq!(trip.summary.end_time, Some(datetime!(2024-03-01 12:10:00 UTC)));
        assert_eq!(trip.summary.distance_km, Some(12.5));
        assert_eq!(trip.summary.max_speed_kmh, Some(88.0));
    }

    #[test]
    fn test_out_of_range_millis_are_discarded() {
        let trip = parse_trip_json(
            br#"{"routePoints": [
                {"latitude": 1.0, "longitude": 1.0, "timestamp": 1e33},
                {"latitude": 1.0, "longitude": 1.0, "timestamp": -9e20},
                {"latitude": 1.0, "longitude": 1.0, "timestamp": 1709294460000}
            ]}"#,
        )
        .unwrap();

        assert_eq!(trip.discarded, 2);
        assert_eq!(trip.fixes.len(), 1);
        assert_eq!(trip.fixes[0].recorded_at, datetime!(2024-03-01 12:01:00 UTC));
    }

    #[test]
    fn test_missing_route_points() {
        let err = parse_trip_json(br#"{"id": "abc"}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTripFile(_)));

        let err = parse_trip_json(b"not json").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn test_parse_gpx() {
        let gpx = br#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Route gps-001</name>
    <trkseg>
      <trkpt lat="-34.6037" lon="-58.3816"><ele>25.0</ele><time>2024-03-01T12:00:00Z</time></trkpt>
      <trkpt lat="-34.6040" lon="-58.3820"><time>2024-03-01T12:01:00Z</time></trkpt>
      <trkpt lat="-34.6050" lon="-58.3830"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

        let trip = parse_trip_file(FileType::Other, Bytes::from_static(gpx)).unwrap();

        assert_eq!(trip.fixes.len(), 2);
        assert_eq!(trip.discarded, 1);
        assert_eq!(trip.fixes[0].lat, -34.6037);
        assert_eq!(trip.fixes[0].lon, -58.3816);
        assert_eq!(trip.fixes[0].altitude, Some(25.0));
        assert_eq!(trip.summary.id.as_deref(), Some("Route gps-001"));
        assert_eq!(trip.summary.end_time, Some(datetime!(2024-03-01 12:01:00 UTC)));
    }

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::detect_from_bytes(b"  {\"routePoints\": []}"), FileType::Json);
        assert_eq!(
            FileType::detect_from_bytes(b"<?xml version=\"1.0\"?><gpx version=\"1.1\">"),
            FileType::Gpx
        );
        assert_eq!(FileType::detect_from_bytes(b"random bytes"), FileType::Other);

        let err = parse_trip_file(FileType::Other, Bytes::from_static(b"random")).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFileType(FileType::Other)));
    }

    #[test]
    fn test_file_type_from_mime() {
        let json: Mime = "application/json".parse().unwrap();
        let gpx: Mime = "application/gpx+xml".parse().unwrap();
        let png: Mime = "image/png".parse().unwrap();

        assert_eq!(FileType::from(json), FileType::Json);
        assert_eq!(FileType::from(gpx), FileType::Gpx);
        assert_eq!(FileType::from(png), FileType::Other);
    }
}
