//! Coordinate model for geographic positions

use serde::{Deserialize, Serialize};

/// Geographic position in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Linear interpolation towards `other`; `fraction` 0 yields `self`, 1 yields `other`
    #[must_use]
    pub fn lerp(&self, other: &Coordinate, fraction: f64) -> Self {
        Self {
            latitude: self.latitude + (other.latitude - self.latitude) * fraction,
            longitude: self.longitude + (other.longitude - self.longitude) * fraction,
        }
    }

    /// Whether both components lie within the valid WGS84 ranges
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Format coordinate as a display string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates, e.g. for keying weather requests
    #[must_use]
    pub fn rounded(&self, precision: u32) -> Self {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        Self {
            latitude: (self.latitude * multiplier).round() / multiplier,
            longitude: (self.longitude * multiplier).round() / multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_midpoint() {
        let a = Coordinate::new(46.0, 8.0);
        let b = Coordinate::new(47.0, 9.0);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid, Coordinate::new(46.5, 8.5));
        assert_eq!(a.lerp(&b, 0.0), a);
    }

    #[test]
    fn test_rounded_coordinates() {
        let coordinate = Coordinate::new(46.818_234, 8.227_456);
        let rounded = coordinate.rounded(2);
        assert_eq!(rounded.latitude, 46.82);
        assert_eq!(rounded.longitude, 8.23);
    }

    #[test]
    fn test_validity() {
        assert!(Coordinate::new(47.6, -122.3).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -181.0).is_valid());
    }

    #[test]
    fn test_format_coordinates() {
        assert_eq!(
            Coordinate::new(47.60621, -122.33207).format_coordinates(),
            "47.6062, -122.3321"
        );
    }
}
