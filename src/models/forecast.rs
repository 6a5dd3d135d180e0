//! Forecast points sampled along a route and their merged weather

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AlongRoute, Coordinate, WeatherObservation};

/// A distance-interpolated point along a route at which weather is sampled
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ForecastPoint {
    pub coordinate: Coordinate,
    /// Cumulative distance from the route start in kilometers
    pub distance_km: f64,
    /// Estimated arrival time at this point
    pub estimated_time: DateTime<Utc>,
}

impl ForecastPoint {
    #[must_use]
    pub fn new(coordinate: Coordinate, distance_km: f64, estimated_time: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            distance_km,
            estimated_time,
        }
    }

    /// Estimated arrival as unix seconds
    #[must_use]
    pub fn unix_timestamp(&self) -> i64 {
        self.estimated_time.timestamp()
    }
}

impl AlongRoute for ForecastPoint {
    fn distance_km(&self) -> f64 {
        self.distance_km
    }
}

/// A forecast point paired with the weather observed for it, if any
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MergedPoint {
    #[serde(flatten)]
    pub point: ForecastPoint,
    pub weather: Option<WeatherObservation>,
}

impl MergedPoint {
    #[must_use]
    pub fn has_weather(&self) -> bool {
        self.weather.is_some()
    }
}

impl AlongRoute for MergedPoint {
    fn distance_km(&self) -> f64 {
        self.point.distance_km
    }
}
