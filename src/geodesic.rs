//! Great-circle distance on a spherical earth

use crate::models::Coordinate;

/// Mean earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two latitude/longitude pairs.
///
/// Returns exactly `0.0` for identical inputs and the same value regardless of argument order.
#[must_use]
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let half_d_lat = (lat2 - lat1).to_radians() / 2.0;
    let half_d_lon = (lon2 - lon1).to_radians() / 2.0;

    // single product keeps the result bit-identical when the points are swapped
    let cos_product = lat1.to_radians().cos() * lat2.to_radians().cos();

    let a = half_d_lat.sin().powi(2) + half_d_lon.sin().powi(2) * cos_product;
    let c = 2.0 * a.sqrt().clamp(-1.0, 1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Haversine distance in kilometers between two coordinates
#[must_use]
pub fn distance_between(from: &Coordinate, to: &Coordinate) -> f64 {
    distance(from.latitude, from.longitude, to.latitude, to.longitude)
}
