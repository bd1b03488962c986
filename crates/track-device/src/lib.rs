pub mod analytics;
pub mod config;
pub mod distance;
pub mod errors;
pub mod file_parsers;
pub mod geo_math;
pub mod gpx_export;
pub mod handlers;
pub mod live;
pub mod locations;
pub mod models;
pub mod normalizer;
pub mod segment_metric;
pub mod speed;
pub mod speed_classifier;

use axum::{
    Extension, Router,
    http::{HeaderValue, Method, header},
    response::Json,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use utoipa::OpenApi;

use crate::{
    config::Config,
    handlers::{
        SharedSource, analyze_batch, analyze_fixes, export_device_gpx, export_fixes,
        get_device_analysis, get_device_points, get_last_location, get_live, health_check,
        start_live, stop_live, upload_trip,
    },
    live::LiveRegistry,
    locations::LocationsClient,
};

pub use analytics::{TrackAnalytics, analyze};
pub use models::{Fix, TrackAnalysis};
pub use normalizer::{NormalizedTrack, normalize};

#[derive(OpenApi)]
#[openapi(
    info(title = "Track Device API", description = "GPS track analytics for fleet devices"),
    paths(
        handlers::health_check,
        handlers::analyze_fixes,
        handlers::analyze_batch,
        handlers::upload_trip,
        handlers::export_fixes,
        handlers::get_device_analysis,
        handlers::get_device_points,
        handlers::get_last_location,
        handlers::export_device_gpx,
        handlers::start_live,
        handlers::get_live,
        handlers::stop_live,
    ),
    components(schemas(
        models::Fix,
        models::DistanceStats,
        models::TrackBounds,
        speed_classifier::SpeedBand,
        handlers::AnalysisResponse,
        handlers::ChartEntry,
        handlers::MapSegment,
        handlers::TripUploadResponse,
        handlers::DeviceAnalysisResponse,
        handlers::LiveStatusResponse,
        handlers::LiveSnapshotResponse,
        handlers::StartLiveRequest,
        file_parsers::TripSummary,
    )),
    tags(
        (name = "stats", description = "Service health"),
        (name = "analysis", description = "Analysis of submitted tracks and trip files"),
        (name = "devices", description = "Analysis of device tracks from the locations API"),
        (name = "live", description = "Periodic re-analysis of a device's current track")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(source: SharedSource, config: Config) -> Router {
    let registry = LiveRegistry::new();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        // Stateless analysis
        .route("/analyze", post(analyze_fixes))
        .route("/analyze/batch", post(analyze_batch))
        .route("/trips/upload", post(upload_trip))
        .route("/trips/export", post(export_fixes))
        // Device routes
        .route("/devices/{id}/analysis", get(get_device_analysis))
        .route("/devices/{id}/points", get(get_device_points))
        .route("/devices/{id}/last-location", get(get_last_location))
        .route("/devices/{id}/export.gpx", get(export_device_gpx))
        .route(
            "/devices/{id}/live",
            get(get_live).post(start_live).delete(stop_live),
        )
        .layer(Extension(source))
        .layer(Extension(config))
        .layer(Extension(registry))
        .layer(cors)
        .layer(CompressionLayer::new())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let client = LocationsClient::new(&config.locations_api_base, config.request_timeout)?;
    let port = config.port;
    let app = create_router(std::sync::Arc::new(client), config);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
