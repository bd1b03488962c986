//! Client for the remote locations API.
//!
//! The [`LocationSource`] trait is the seam the HTTP handlers and the live
//! poller depend on; [`LocationsClient`] is the reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::models::Fix;

#[derive(Debug, Error)]
pub enum LocationsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Locations API returned status {0}")]
    Status(u16),
    #[error("Invalid locations API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Half-open time window `[from, to)` for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationsQuery {
    pub device_id: String,
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationBatch {
    pub fixes: Vec<Fix>,
    /// Count reported by the API, which may exceed `fixes.len()`
    pub count: u64,
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn fetch_locations(&self, query: &LocationsQuery)
    -> Result<LocationBatch, LocationsError>;

    /// Most recent record in the window, as reported first by the API.
    async fn fetch_last_location(
        &self,
        device_id: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Option<Fix>, LocationsError> {
        let query = LocationsQuery {
            device_id: device_id.to_string(),
            from,
            to,
            limit: 1,
        };
        let batch = self.fetch_locations(&query).await?;
        Ok(batch.fixes.into_iter().next())
    }
}

/// Wire format of a locations response.
#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    locations: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LocationRecord {
    lat: f64,
    lon: f64,
    recorded_at: String,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    altitude: Option<f64>,
}

impl LocationRecord {
    fn to_fix(&self) -> Option<Fix> {
        let recorded_at = OffsetDateTime::parse(self.recorded_at.trim(), &Rfc3339).ok()?;
        Fix {
            lat: self.lat,
            lon: self.lon,
            recorded_at,
            speed: self.speed,
            altitude: self.altitude,
        }
        .sanitized()
    }
}

fn decode_response(response: LocationsResponse) -> LocationBatch {
    let records = response.locations.unwrap_or_default();
    let total = records.len();

    let fixes: Vec<Fix> = records
        .into_iter()
        .filter_map(|raw| {
            serde_json::from_value::<LocationRecord>(raw)
                .ok()
                .and_then(|r| r.to_fix())
        })
        .collect();

    if fixes.len() < total {
        tracing::warn!(
            "Discarded {} malformed location records",
            total - fixes.len()
        );
    }

    LocationBatch {
        fixes,
        count: response.count.unwrap_or(0),
    }
}

#[derive(Debug, Clone)]
pub struct LocationsClient {
    client: Client,
    base_url: Url,
}

impl LocationsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LocationsError> {
        let base_url =
            Url::parse(base_url).map_err(|e| LocationsError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(LocationsError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// `{base}/devices/{device_id}/locations`, with the device id percent-encoded.
    pub fn locations_url(&self, device_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["devices", device_id, "locations"]);
        }
        url
    }
}

#[async_trait]
impl LocationSource for LocationsClient {
    async fn fetch_locations(
        &self,
        query: &LocationsQuery,
    ) -> Result<LocationBatch, LocationsError> {
        let url = self.locations_url(&query.device_id);
        let from = query.from.format(&Rfc3339).unwrap_or_default();
        let to = query.to.format(&Rfc3339).unwrap_or_default();
        let limit = query.limit.to_string();

        tracing::debug!(device = %query.device_id, %from, %to, limit = query.limit, "Fetching locations");

        let resp = self
            .client
            .get(url)
            .query(&[("from", from.as_str()), ("to", to.as_str()), ("limit", limit.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LocationsError::Status(resp.status().as_u16()));
        }

        let body: LocationsResponse = resp.json().await?;
        Ok(decode_response(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_decode_response() {
        let body: LocationsResponse = serde_json::from_str(
            r#"{
                "count": 3,
                "locations": [
                    {"id": 1, "lat": -34.6037, "lon": -58.3816, "recorded_at": "2024-03-01T12:00:00Z", "speed": 12.5},
                    {"id": 2, "lat": "bad", "lon": -58.3816, "recorded_at": "2024-03-01T12:00:10Z"},
                    {"id": 3, "lat": -34.6040, "lon": -58.3820, "recorded_at": "2024-03-01T12:00:20.500Z"}
                ]
            }"#,
        )
        .unwrap();

        let batch = decode_response(body);
        assert_eq!(batch.count, 3);
        assert_eq!(batch.fixes.len(), 2);
        assert_eq!(batch.fixes[0].speed, Some(12.5));
        assert_eq!(
            batch.fixes[1].recorded_at,
            datetime!(2024-03-01 12:00:20.5 UTC)
        );
    }

    #[test]
    fn test_decode_empty_response() {
        let body: LocationsResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(decode_response(body), LocationBatch::default());
    }

    #[test]
    fn test_locations_url_encodes_device() {
        let client =
            LocationsClient::new("https://api.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.locations_url("gps 001/a").as_str(),
            "https://api.example.com/devices/gps%20001%2Fa/locations"
        );

        let client =
            LocationsClient::new("https://api.example.com/v1", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.locations_url("gps-001").as_str(),
            "https://api.example.com/v1/devices/gps-001/locations"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = LocationsClient::new("not a url", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, LocationsError::InvalidBaseUrl(_)));
    }
}
