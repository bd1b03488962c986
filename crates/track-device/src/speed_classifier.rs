use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Severity band for a speed, used to color map segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeedBand {
    Green,
    Yellow,
    Red,
    DarkRed,
}

impl SpeedBand {
    /// Band for a speed in km/h. Each boundary belongs to the band above it.
    pub fn classify(speed_kmh: f64) -> Self {
        if speed_kmh < 40.0 {
            SpeedBand::Green
        } else if speed_kmh < 80.0 {
            SpeedBand::Yellow
        } else if speed_kmh < 110.0 {
            SpeedBand::Red
        } else {
            SpeedBand::DarkRed
        }
    }

    /// Dashboard color for the band.
    pub fn hex(self) -> &'static str {
        match self {
            SpeedBand::Green => "#4ade80",
            SpeedBand::Yellow => "#fbbf24",
            SpeedBand::Red => "#f87171",
            SpeedBand::DarkRed => "#991b1b",
        }
    }
}

pub fn classify(speed_kmh: f64) -> SpeedBand {
    SpeedBand::classify(speed_kmh)
}
