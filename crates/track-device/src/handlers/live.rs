//! Live mode handlers.

use axum::{
    Extension,
    extract::Path,
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    analytics::TrackAnalytics,
    config::Config,
    errors::AppError,
    live::{LiveRegistry, LiveSnapshot, LiveWindow},
    models::Fix,
};

use super::{
    analysis::AnalysisResponse,
    devices::{SharedSource, parse_timestamp, resolve_limit, start_of_day},
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StartLiveRequest {
    /// Window start (RFC 3339); defaults to midnight today in the display offset
    pub from: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveSnapshotResponse {
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub fetched_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub to: OffsetDateTime,
    pub count: u64,
    pub analysis: AnalysisResponse,
    pub last_location: Option<Fix>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveStatusResponse {
    pub device_id: String,
    pub running: bool,
    pub interval_seconds: u64,
    /// Absent until the first poll completes
    pub snapshot: Option<LiveSnapshotResponse>,
}

fn snapshot_response(snapshot: &LiveSnapshot, config: &Config) -> LiveSnapshotResponse {
    LiveSnapshotResponse {
        sequence: snapshot.sequence,
        fetched_at: snapshot.fetched_at,
        from: snapshot.from,
        to: snapshot.to,
        count: snapshot.count,
        analysis: AnalysisResponse::from_analysis(
            snapshot.analysis.clone(),
            config.display_offset,
        ),
        last_location: snapshot.last_location,
        error: snapshot.error.clone(),
    }
}

/// Start (or restart) live polling for a device.
#[utoipa::path(
    post,
    path = "/devices/{id}/live",
    tag = "live",
    params(
        ("id" = String, Path, description = "Device ID")
    ),
    request_body = StartLiveRequest,
    responses(
        (status = 202, description = "Polling started", body = LiveStatusResponse),
        (status = 400, description = "Invalid window")
    )
)]
pub async fn start_live(
    Extension(source): Extension<SharedSource>,
    Extension(config): Extension<Config>,
    Extension(registry): Extension<LiveRegistry>,
    Path(device_id): Path<String>,
    Json(req): Json<StartLiveRequest>,
) -> Result<(StatusCode, Json<LiveStatusResponse>), AppError> {
    let now = OffsetDateTime::now_utc();
    let from = match &req.from {
        Some(raw) => parse_timestamp(raw, "from")?,
        None => start_of_day(now, config.display_offset),
    };
    if from >= now {
        return Err(AppError::InvalidInput(
            "from must be in the past".to_string(),
        ));
    }

    let window = LiveWindow {
        device_id: device_id.clone(),
        from,
        limit: resolve_limit(req.limit, &config)?,
    };
    registry.start(
        source,
        window,
        config.live_poll_interval,
        TrackAnalytics::new(config.limits),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(LiveStatusResponse {
            device_id,
            running: true,
            interval_seconds: config.live_poll_interval.as_secs(),
            snapshot: None,
        }),
    ))
}

/// Latest live snapshot for a device.
#[utoipa::path(
    get,
    path = "/devices/{id}/live",
    tag = "live",
    params(
        ("id" = String, Path, description = "Device ID")
    ),
    responses(
        (status = 200, description = "Live status and latest snapshot", body = LiveStatusResponse),
        (status = 404, description = "No live polling for this device")
    )
)]
pub async fn get_live(
    Extension(config): Extension<Config>,
    Extension(registry): Extension<LiveRegistry>,
    Path(device_id): Path<String>,
) -> Result<Json<LiveStatusResponse>, AppError> {
    let latest = registry.latest(&device_id).ok_or(AppError::NotFound)?;

    Ok(Json(LiveStatusResponse {
        running: registry.is_running(&device_id),
        interval_seconds: config.live_poll_interval.as_secs(),
        snapshot: latest.map(|s| snapshot_response(&s, &config)),
        device_id,
    }))
}

/// Stop live polling for a device.
#[utoipa::path(
    delete,
    path = "/devices/{id}/live",
    tag = "live",
    params(
        ("id" = String, Path, description = "Device ID")
    ),
    responses(
        (status = 204, description = "Polling stopped"),
        (status = 404, description = "No live polling for this device")
    )
)]
pub async fn stop_live(
    Extension(registry): Extension<LiveRegistry>,
    Path(device_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if registry.stop(&device_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
