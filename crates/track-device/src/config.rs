//! Runtime configuration read from the environment.

use std::{env, str::FromStr, time::Duration};

use time::UtcOffset;

use crate::distance::{DEFAULT_MAX_GAP_SECONDS, DEFAULT_MAX_SPEED_KMH, DistanceLimits};

pub const DEFAULT_LOCATIONS_API_BASE: &str = "https://api.appvelocidad.mabcontrol.ar";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_LOCATIONS_LIMIT: u32 = 200;
pub const DEFAULT_LIVE_POLL_SECONDS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;
/// Buenos Aires
pub const DEFAULT_DISPLAY_UTC_OFFSET_HOURS: i8 = -3;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub locations_api_base: String,
    /// Result cap when a request does not name one
    pub default_limit: u32,
    pub live_poll_interval: Duration,
    pub request_timeout: Duration,
    pub limits: DistanceLimits,
    /// Offset used for chart time labels
    pub display_offset: UtcOffset,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            locations_api_base: DEFAULT_LOCATIONS_API_BASE.to_string(),
            default_limit: DEFAULT_LOCATIONS_LIMIT,
            live_poll_interval: Duration::from_secs(DEFAULT_LIVE_POLL_SECONDS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            limits: DistanceLimits::default(),
            display_offset: offset_from_hours(DEFAULT_DISPLAY_UTC_OFFSET_HOURS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let live_poll_seconds =
            parse_or(&lookup, "LIVE_POLL_SECONDS", DEFAULT_LIVE_POLL_SECONDS).max(1);
        let offset_hours = parse_or(
            &lookup,
            "DISPLAY_UTC_OFFSET_HOURS",
            DEFAULT_DISPLAY_UTC_OFFSET_HOURS,
        );
        let mut max_speed_kmh = parse_positive_or(&lookup, "MAX_SPEED_KMH", DEFAULT_MAX_SPEED_KMH);
        if !max_speed_kmh.is_finite() {
            tracing::warn!("MAX_SPEED_KMH must be finite, using {DEFAULT_MAX_SPEED_KMH}");
            max_speed_kmh = DEFAULT_MAX_SPEED_KMH;
        }

        Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            locations_api_base: lookup("LOCATIONS_API_BASE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCATIONS_API_BASE.to_string()),
            default_limit: parse_positive_or(
                &lookup,
                "LOCATIONS_DEFAULT_LIMIT",
                DEFAULT_LOCATIONS_LIMIT,
            ),
            live_poll_interval: Duration::from_secs(live_poll_seconds),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )),
            limits: DistanceLimits {
                max_speed_kmh,
                max_gap_seconds: parse_positive_or(
                    &lookup,
                    "MAX_GAP_SECONDS",
                    DEFAULT_MAX_GAP_SECONDS,
                ),
            },
            display_offset: offset_from_hours(offset_hours),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {raw:?} for {key}, using {default}");
            default
        }),
    }
}

/// Like [`parse_or`], but zero and negative values also fall back.
fn parse_positive_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display + PartialOrd + Default,
{
    let value = parse_or(lookup, key, default);
    // NaN fails this comparison too
    if value > T::default() {
        value
    } else {
        tracing::warn!("{key} must be positive, got {value}, using {default}");
        default
    }
}

fn offset_from_hours(hours: i8) -> UtcOffset {
    UtcOffset::from_hms(hours, 0, 0).unwrap_or(UtcOffset::UTC)
}
