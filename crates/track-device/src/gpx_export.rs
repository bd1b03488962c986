//! GPX 1.1 export of a normalized track.

use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::normalizer::NormalizedTrack;

pub const GPX_CREATOR: &str = "TrackDevice";

/// Serialize `track` as a single-segment GPX track named `Route <device_id>`.
pub fn export_gpx(
    track: &NormalizedTrack,
    device_id: &str,
) -> Result<Vec<u8>, gpx::errors::GpxError> {
    let mut segment = TrackSegment::new();
    segment.points = track
        .iter()
        .map(|fix| {
            let mut wpt = Waypoint::new(fix.point());
            wpt.time = Some(fix.recorded_at.into());
            wpt.elevation = fix.altitude;
            wpt
        })
        .collect();

    let mut gpx_track = Track::new();
    gpx_track.name = Some(format!("Route {device_id}"));
    gpx_track.segments.push(segment);

    let doc = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(GPX_CREATOR.to_string()),
        tracks: vec![gpx_track],
        ..Default::default()
    };

    let mut out = Vec::new();
    gpx::write(&doc, &mut out)?;
    Ok(out)
}

/// File name offered for download.
pub fn export_file_name(device_id: &str) -> String {
    let safe: String = device_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("route-{safe}.gpx")
}
