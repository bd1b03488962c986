//! Great-circle distance.
//!
//! Every distance the crate reports goes through [`distance_km`] so that the
//! aggregate statistics, the chart and the map coloring agree to the last bit.

use crate::models::Fix;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Anything with a latitude and longitude in degrees.
pub trait LatLon {
    fn lat(&self) -> f64;
    fn lon(&self) -> f64;
}

impl LatLon for Fix {
    fn lat(&self) -> f64 {
        self.lat
    }

    fn lon(&self) -> f64 {
        self.lon
    }
}

/// `(lat, lon)` pair
impl LatLon for (f64, f64) {
    fn lat(&self) -> f64 {
        self.0
    }

    fn lon(&self) -> f64 {
        self.1
    }
}

impl LatLon for geo::Point<f64> {
    fn lat(&self) -> f64 {
        self.y()
    }

    fn lon(&self) -> f64 {
        self.x()
    }
}

/// Haversine distance between two positions in kilometers.
///
/// Inputs are not range-checked. Returns exactly `0.0` for identical positions.
pub fn distance_km<A: LatLon + ?Sized, B: LatLon + ?Sized>(a: &A, b: &B) -> f64 {
    let lat1_rad = a.lat().to_radians();
    let lat2_rad = b.lat().to_radians();
    let delta_lat = (b.lat() - a.lat()).to_radians();
    let delta_lon = (b.lon() - a.lon()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
