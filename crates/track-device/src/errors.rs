use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{file_parsers::ParseError, locations::LocationsError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Locations API error: {0}")]
    Locations(#[from] LocationsError),

    #[error("Trip file error: {0}")]
    Parse(#[from] ParseError),

    #[error("GPX export error: {0}")]
    GpxExport(#[from] gpx::errors::GpxError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Locations(e) => {
                error!("Locations API error: {e}");
                (StatusCode::BAD_GATEWAY, "Locations API unavailable".to_string())
            }
            AppError::Parse(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::GpxExport(e) => {
                error!("GPX export error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
