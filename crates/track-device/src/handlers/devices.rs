//! Device handlers backed by the remote locations API.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, Query},
    response::{Json, Response},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, Time, UtcOffset, format_description::well_known::Rfc3339};
use utoipa::{IntoParams, ToSchema};

use crate::{
    analytics::TrackAnalytics,
    config::Config,
    errors::AppError,
    gpx_export,
    locations::{LocationSource, LocationsQuery},
    models::Fix,
    normalizer,
};

use super::{
    analysis::{AnalysisResponse, gpx_attachment},
    pagination::{PaginatedResponse, default_page_size},
};

/// Largest `limit` forwarded to the locations API.
pub const MAX_LOCATIONS_LIMIT: u32 = 10_000;

pub type SharedSource = Arc<dyn LocationSource>;

/// Time window for a device query. Timestamps are RFC 3339.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct WindowQuery {
    /// Window start; defaults to midnight today in the display offset
    pub from: Option<String>,
    /// Window end; defaults to one day after `from`
    pub to: Option<String>,
    /// Maximum number of records to fetch
    pub limit: Option<u32>,
}

impl WindowQuery {
    pub fn resolve(&self, device_id: &str, config: &Config) -> Result<LocationsQuery, AppError> {
        let now = OffsetDateTime::now_utc();
        let from = match &self.from {
            Some(raw) => parse_timestamp(raw, "from")?,
            None => start_of_day(now, config.display_offset),
        };
        let to = match &self.to {
            Some(raw) => parse_timestamp(raw, "to")?,
            None => from.checked_add(Duration::days(1)).ok_or_else(|| {
                AppError::InvalidInput("from is too far in the future".to_string())
            })?,
        };
        if from >= to {
            return Err(AppError::InvalidInput(
                "from must be earlier than to".to_string(),
            ));
        }

        Ok(LocationsQuery {
            device_id: device_id.to_string(),
            from,
            to,
            limit: resolve_limit(self.limit, config)?,
        })
    }
}

pub(crate) fn parse_timestamp(raw: &str, field: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|_| AppError::InvalidInput(format!("{field} must be an RFC 3339 timestamp")))
}

pub(crate) fn resolve_limit(limit: Option<u32>, config: &Config) -> Result<u32, AppError> {
    match limit {
        Some(0) => Err(AppError::InvalidInput("limit must be positive".to_string())),
        Some(n) => Ok(n.min(MAX_LOCATIONS_LIMIT)),
        None => Ok(config.default_limit),
    }
}

/// Midnight of `now`'s calendar day as seen in `offset`.
pub(crate) fn start_of_day(now: OffsetDateTime, offset: UtcOffset) -> OffsetDateTime {
    now.to_offset(offset).replace_time(Time::MIDNIGHT)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceAnalysisResponse {
    pub device_id: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub to: OffsetDateTime,
    /// Count reported by the locations API
    pub count: u64,
    pub analysis: AnalysisResponse,
}

/// Fetch a device's window and analyze it.
#[utoipa::path(
    get,
    path = "/devices/{id}/analysis",
    tag = "devices",
    params(
        ("id" = String, Path, description = "Device ID"),
        WindowQuery
    ),
    responses(
        (status = 200, description = "Analysis of the device's window", body = DeviceAnalysisResponse),
        (status = 400, description = "Invalid window"),
        (status = 502, description = "Locations API unavailable")
    )
)]
pub async fn get_device_analysis(
    Extension(source): Extension<SharedSource>,
    Extension(config): Extension<Config>,
    Path(device_id): Path<String>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<DeviceAnalysisResponse>, AppError> {
    let query = params.resolve(&device_id, &config)?;
    let batch = source.fetch_locations(&query).await?;

    let analysis = TrackAnalytics::new(config.limits).analyze(batch.fixes);
    Ok(Json(DeviceAnalysisResponse {
        device_id,
        from: query.from,
        to: query.to,
        count: batch.count,
        analysis: AnalysisResponse::from_analysis(analysis, config.display_offset),
    }))
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct PointsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<u32>,
    /// Number of points to skip
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Raw points of a device's window, newest first.
#[utoipa::path(
    get,
    path = "/devices/{id}/points",
    tag = "devices",
    params(
        ("id" = String, Path, description = "Device ID"),
        PointsQuery
    ),
    responses(
        (status = 200, description = "One page of points", body = PaginatedResponse<Fix>),
        (status = 400, description = "Invalid window"),
        (status = 502, description = "Locations API unavailable")
    )
)]
pub async fn get_device_points(
    Extension(source): Extension<SharedSource>,
    Extension(config): Extension<Config>,
    Path(device_id): Path<String>,
    Query(params): Query<PointsQuery>,
) -> Result<Json<PaginatedResponse<Fix>>, AppError> {
    let window = WindowQuery {
        from: params.from,
        to: params.to,
        limit: params.limit,
    };
    let query = window.resolve(&device_id, &config)?;
    let mut fixes = source.fetch_locations(&query).await?.fixes;

    fixes.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    Ok(Json(PaginatedResponse::from_items(
        fixes,
        params.offset,
        params.page_size,
    )))
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct LastLocationQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Most recent fix of a device within the window.
#[utoipa::path(
    get,
    path = "/devices/{id}/last-location",
    tag = "devices",
    params(
        ("id" = String, Path, description = "Device ID"),
        LastLocationQuery
    ),
    responses(
        (status = 200, description = "Latest fix", body = Fix),
        (status = 404, description = "No fix in the window"),
        (status = 502, description = "Locations API unavailable")
    )
)]
pub async fn get_last_location(
    Extension(source): Extension<SharedSource>,
    Extension(config): Extension<Config>,
    Path(device_id): Path<String>,
    Query(params): Query<LastLocationQuery>,
) -> Result<Json<Fix>, AppError> {
    let window = WindowQuery {
        from: params.from,
        to: params.to,
        limit: Some(1),
    };
    let query = window.resolve(&device_id, &config)?;

    let fix = source
        .fetch_last_location(&device_id, query.from, query.to)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(fix))
}

/// Download a device's normalized window as GPX.
#[utoipa::path(
    get,
    path = "/devices/{id}/export.gpx",
    tag = "devices",
    params(
        ("id" = String, Path, description = "Device ID"),
        WindowQuery
    ),
    responses(
        (status = 200, description = "GPX 1.1 document", body = String, content_type = "application/gpx+xml"),
        (status = 404, description = "No fixes in the window"),
        (status = 502, description = "Locations API unavailable")
    )
)]
pub async fn export_device_gpx(
    Extension(source): Extension<SharedSource>,
    Extension(config): Extension<Config>,
    Path(device_id): Path<String>,
    Query(params): Query<WindowQuery>,
) -> Result<Response, AppError> {
    let query = params.resolve(&device_id, &config)?;
    let batch = source.fetch_locations(&query).await?;

    let track = normalizer::normalize(batch.fixes);
    if track.is_empty() {
        return Err(AppError::NotFound);
    }

    let body = gpx_export::export_gpx(&track, &device_id)?;
    Ok(gpx_attachment(body, &gpx_export::export_file_name(&device_id)))
}
