//! Stateless analysis handlers: fixes or trip files in, analysis out.

use axum::{
    Extension,
    extract::Query,
    http::{HeaderMap, header},
    response::{IntoResponse, Json, Response},
};
use axum_extra::headers::{ContentType, HeaderMapExt, Mime};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::UtcOffset;
use utoipa::{IntoParams, ToSchema};

use crate::{
    analytics::TrackAnalytics,
    config::Config,
    distance::DistanceLimits,
    errors::AppError,
    file_parsers::{self, FileType, TripSummary},
    gpx_export,
    models::{DistanceStats, Fix, TrackAnalysis, TrackBounds},
    normalizer,
    speed::SpeedMode,
    speed_classifier::SpeedBand,
};

/// One sample of the speed chart as rendered by clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChartEntry {
    pub segment_index: usize,
    /// `HH:MM` in the configured display offset
    pub time_label: String,
    pub speed_kmh: f64,
    /// Speed clamped to the chart ceiling and rounded
    pub display_kmh: f64,
}

/// One colored path segment of the map.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MapSegment {
    pub segment_index: usize,
    pub speed_kmh: f64,
    pub color: SpeedBand,
    pub hex: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalysisResponse {
    /// Normalized track, oldest first
    pub points: Vec<Fix>,
    pub distance: DistanceStats,
    pub map: Vec<MapSegment>,
    pub chart: Vec<ChartEntry>,
    pub bounds: Option<TrackBounds>,
}

impl AnalysisResponse {
    pub fn from_analysis(analysis: TrackAnalysis, offset: UtcOffset) -> Self {
        let chart = analysis
            .chart_speeds
            .iter()
            .map(|point| ChartEntry {
                segment_index: point.segment_index,
                time_label: point.time_label(offset),
                speed_kmh: point.speed_kmh,
                display_kmh: point
                    .speed_kmh
                    .min(SpeedMode::CHART_DISPLAY_CEILING_KMH)
                    .round(),
            })
            .collect();

        let map = analysis
            .map_speed_colors
            .iter()
            .map(|sample| MapSegment {
                segment_index: sample.segment_index,
                speed_kmh: sample.speed_kmh,
                color: sample.color,
                hex: sample.color.hex().to_string(),
            })
            .collect();

        Self {
            points: analysis.normalized.into_inner(),
            distance: analysis.distance_stats,
            map,
            chart,
            bounds: analysis.bounds,
        }
    }
}

/// Optional overrides of the configured distance limits.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct LimitsQuery {
    /// Segments faster than this are skipped (km/h)
    pub max_speed_kmh: Option<f64>,
    /// Segments longer than this are skipped (seconds)
    pub max_gap_seconds: Option<i64>,
}

impl LimitsQuery {
    pub fn resolve(&self, defaults: DistanceLimits) -> Result<DistanceLimits, AppError> {
        let max_speed_kmh = self.max_speed_kmh.unwrap_or(defaults.max_speed_kmh);
        if !max_speed_kmh.is_finite() || max_speed_kmh <= 0.0 {
            return Err(AppError::InvalidInput(
                "max_speed_kmh must be a positive number".to_string(),
            ));
        }
        let max_gap_seconds = self.max_gap_seconds.unwrap_or(defaults.max_gap_seconds);
        if max_gap_seconds <= 0 {
            return Err(AppError::InvalidInput(
                "max_gap_seconds must be positive".to_string(),
            ));
        }
        Ok(DistanceLimits {
            max_speed_kmh,
            max_gap_seconds,
        })
    }
}

/// Map client-supplied fixes through the same validation as API records.
fn accept_fixes(fixes: Vec<Fix>) -> Vec<Fix> {
    let total = fixes.len();
    let accepted: Vec<Fix> = fixes.into_iter().filter_map(Fix::sanitized).collect();
    if accepted.len() < total {
        tracing::debug!("Rejected {} fixes with invalid coordinates", total - accepted.len());
    }
    accepted
}

pub(crate) fn gpx_attachment(body: Vec<u8>, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, FileType::Gpx.as_mime_str().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// Analyze a list of fixes.
#[utoipa::path(
    post,
    path = "/analyze",
    tag = "analysis",
    params(LimitsQuery),
    request_body = Vec<Fix>,
    responses(
        (status = 200, description = "Track analysis", body = AnalysisResponse),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn analyze_fixes(
    Extension(config): Extension<Config>,
    Query(params): Query<LimitsQuery>,
    Json(fixes): Json<Vec<Fix>>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let analytics = TrackAnalytics::new(params.resolve(config.limits)?);
    let analysis = analytics.analyze(accept_fixes(fixes));
    Ok(Json(AnalysisResponse::from_analysis(
        analysis,
        config.display_offset,
    )))
}

/// Analyze several independent tracks. Results keep the request order.
#[utoipa::path(
    post,
    path = "/analyze/batch",
    tag = "analysis",
    params(LimitsQuery),
    request_body = Vec<Vec<Fix>>,
    responses(
        (status = 200, description = "One analysis per input track", body = Vec<AnalysisResponse>),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn analyze_batch(
    Extension(config): Extension<Config>,
    Query(params): Query<LimitsQuery>,
    Json(tracks): Json<Vec<Vec<Fix>>>,
) -> Result<Json<Vec<AnalysisResponse>>, AppError> {
    let analytics = TrackAnalytics::new(params.resolve(config.limits)?);
    let inputs: Vec<Vec<Fix>> = tracks.into_iter().map(accept_fixes).collect();

    let analyses = tokio::task::spawn_blocking(move || analytics.analyze_batch(inputs))
        .await
        .map_err(|e| {
            tracing::error!("Batch analysis task failed: {e}");
            AppError::Internal
        })?;

    let offset = config.display_offset;
    Ok(Json(
        analyses
            .into_iter()
            .map(|analysis| AnalysisResponse::from_analysis(analysis, offset))
            .collect(),
    ))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TripUploadResponse {
    pub summary: TripSummary,
    /// Route points that could not be read
    pub discarded: usize,
    pub analysis: AnalysisResponse,
}

/// Upload a recorded trip (trip JSON or GPX) and analyze its route.
#[utoipa::path(
    post,
    path = "/trips/upload",
    tag = "analysis",
    params(LimitsQuery),
    request_body(content_type = "application/json", description = "Trip JSON or GPX document"),
    responses(
        (status = 200, description = "Trip summary and analysis", body = TripUploadResponse),
        (status = 400, description = "Unreadable trip file")
    )
)]
pub async fn upload_trip(
    Extension(config): Extension<Config>,
    Query(params): Query<LimitsQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TripUploadResponse>, AppError> {
    if body.is_empty() {
        return Err(AppError::InvalidInput("No file provided".to_string()));
    }
    let analytics = TrackAnalytics::new(params.resolve(config.limits)?);

    let file_type = headers
        .typed_get::<ContentType>()
        .map_or(FileType::Other, |ct| FileType::from(Mime::from(ct)));

    let trip = file_parsers::parse_trip_file(file_type, body)?;
    tracing::info!(
        fixes = trip.fixes.len(),
        discarded = trip.discarded,
        "Parsed uploaded trip"
    );

    let analysis = analytics.analyze(trip.fixes);
    Ok(Json(TripUploadResponse {
        summary: trip.summary,
        discarded: trip.discarded,
        analysis: AnalysisResponse::from_analysis(analysis, config.display_offset),
    }))
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct ExportQuery {
    /// Track name; defaults to `track`
    pub name: Option<String>,
}

/// Normalize a list of fixes and return it as a GPX document.
#[utoipa::path(
    post,
    path = "/trips/export",
    tag = "analysis",
    params(ExportQuery),
    request_body = Vec<Fix>,
    responses(
        (status = 200, description = "GPX 1.1 document", body = String, content_type = "application/gpx+xml")
    )
)]
pub async fn export_fixes(
    Query(params): Query<ExportQuery>,
    Json(fixes): Json<Vec<Fix>>,
) -> Result<Response, AppError> {
    let name = params
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "track".to_string());
    let track = normalizer::normalize(accept_fixes(fixes));
    let body = gpx_export::export_gpx(&track, &name)?;
    Ok(gpx_attachment(body, &gpx_export::export_file_name(&name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics;
    use time::{Duration, macros::datetime};

    #[test]
    fn test_chart_display_is_clamped_and_rounded() {
        let t0 = datetime!(2024-03-01 15:00:00 UTC);
        // ~2.22 km in 40 s is ~200 km/h
        let analysis = analytics::analyze(vec![
            Fix::new(0.0, 0.0, t0),
            Fix::new(0.02, 0.0, t0 + Duration::seconds(40)),
            Fix::new(0.0202, 0.0, t0 + Duration::seconds(100)),
        ]);

        let response = AnalysisResponse::from_analysis(analysis, UtcOffset::from_hms(-3, 0, 0).unwrap());

        assert_eq!(response.chart.len(), 2);
        assert!(response.chart[0].speed_kmh > 180.0);
        assert_eq!(response.chart[0].display_kmh, 180.0);
        assert_eq!(response.chart[0].time_label, "12:00");
        assert_eq!(response.chart[1].display_kmh, response.chart[1].speed_kmh.round());
        assert_eq!(response.map[0].hex, "#991b1b");
        assert_eq!(response.points.len(), 3);
    }

    #[test]
    fn test_limits_query() {
        let defaults = DistanceLimits::default();
        assert_eq!(LimitsQuery::default().resolve(defaults).unwrap(), defaults);

        let custom = LimitsQuery {
            max_speed_kmh: Some(90.0),
            max_gap_seconds: None,
        };
        let limits = custom.resolve(defaults).unwrap();
        assert_eq!(limits.max_speed_kmh, 90.0);
        assert_eq!(limits.max_gap_seconds, defaults.max_gap_seconds);

        let bad = LimitsQuery {
            max_speed_kmh: None,
            max_gap_seconds: Some(0),
        };
        assert!(matches!(bad.resolve(defaults), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_accept_fixes_drops_invalid_coordinates() {
        let t0 = datetime!(2024-03-01 12:00:00 UTC);
        let fixes = accept_fixes(vec![
            Fix::new(91.0, 0.0, t0),
            Fix::new(0.0, 0.0, t0),
            Fix::new(f64::NAN, 0.0, t0),
        ]);
        assert_eq!(fixes.len(), 1);
    }
}
