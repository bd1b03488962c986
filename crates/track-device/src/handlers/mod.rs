//! HTTP request handlers for the track analytics API.
//!
//! This module re-exports handlers from focused submodules organized by domain.

// Utility submodules
pub mod pagination;

// Handler modules
pub mod analysis;
pub mod devices;
pub mod live;
pub mod stats;

// Re-export handlers from submodules (including utoipa __path types for OpenAPI)
pub use analysis::{
    __path_analyze_batch, __path_analyze_fixes, __path_export_fixes, __path_upload_trip,
    AnalysisResponse, ChartEntry, ExportQuery, LimitsQuery, MapSegment, TripUploadResponse,
    analyze_batch, analyze_fixes, export_fixes, upload_trip,
};
pub use devices::{
    __path_export_device_gpx, __path_get_device_analysis, __path_get_device_points,
    __path_get_last_location, DeviceAnalysisResponse, LastLocationQuery, PointsQuery,
    SharedSource, WindowQuery, export_device_gpx, get_device_analysis, get_device_points,
    get_last_location,
};
pub use live::{
    __path_get_live, __path_start_live, __path_stop_live, LiveSnapshotResponse,
    LiveStatusResponse, StartLiveRequest, get_live, start_live, stop_live,
};
pub use pagination::PaginatedResponse;
pub use stats::{__path_health_check, health_check};
