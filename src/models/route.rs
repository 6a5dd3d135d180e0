//! Route model built from a parsed route document

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::Coordinate;
use crate::geodesic;

/// Anything positioned along a route by its cumulative distance from the start
pub trait AlongRoute {
    /// Cumulative distance from the route start in kilometers
    fn distance_km(&self) -> f64;
}

/// A single recorded point of a route
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RoutePoint {
    pub coordinate: Coordinate,
    /// Elevation in meters
    pub elevation: f64,
    /// Recording time, when the document carries one
    pub time: Option<DateTime<Utc>>,
    /// Cumulative distance from the route start in kilometers
    pub distance_km: f64,
}

impl AlongRoute for RoutePoint {
    fn distance_km(&self) -> f64 {
        self.distance_km
    }
}

/// Latitude/longitude bounding box
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Coordinate,
    pub max: Coordinate,
}

/// An immutable route with precomputed distance and elevation statistics.
///
/// Constructed through [`RouteBuilder`], which keeps cumulative distances non-decreasing
/// and starting at zero.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Route {
    name: String,
    points: Vec<RoutePoint>,
    total_distance_km: f64,
    elevation_gain: f64,
    elevation_loss: f64,
    max_elevation: f64,
    min_elevation: f64,
    placeholder: bool,
}

impl Route {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    /// Total length in kilometers, equal to the last point's cumulative distance
    #[must_use]
    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    /// Sum of positive elevation deltas in meters
    #[must_use]
    pub fn elevation_gain(&self) -> f64 {
        self.elevation_gain
    }

    /// Sum of negative elevation deltas in meters, as a positive number
    #[must_use]
    pub fn elevation_loss(&self) -> f64 {
        self.elevation_loss
    }

    #[must_use]
    pub fn max_elevation(&self) -> f64 {
        self.max_elevation
    }

    #[must_use]
    pub fn min_elevation(&self) -> f64 {
        self.min_elevation
    }

    /// Whether this is the fabricated sample route of degraded parsing mode
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn start(&self) -> Option<&RoutePoint> {
        self.points.first()
    }

    #[must_use]
    pub fn end(&self) -> Option<&RoutePoint> {
        self.points.last()
    }

    /// Recorded duration between the first and last point, if both carry a time
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let start = self.start()?.time?;
        let end = self.end()?.time?;
        Some(end - start)
    }

    /// Bounding box of all points
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.start()?.coordinate;
        let bounds = self.points.iter().fold(
            Bounds {
                min: first,
                max: first,
            },
            |acc, point| Bounds {
                min: Coordinate::new(
                    acc.min.latitude.min(point.coordinate.latitude),
                    acc.min.longitude.min(point.coordinate.longitude),
                ),
                max: Coordinate::new(
                    acc.max.latitude.max(point.coordinate.latitude),
                    acc.max.longitude.max(point.coordinate.longitude),
                ),
            },
        );
        Some(bounds)
    }
}

/// Accumulates points in order, computing cumulative distance and elevation statistics
#[derive(Debug)]
pub struct RouteBuilder {
    name: String,
    points: Vec<RoutePoint>,
    total_distance_km: f64,
    elevation_gain: f64,
    elevation_loss: f64,
    max_elevation: f64,
    min_elevation: f64,
    placeholder: bool,
}

impl RouteBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
            total_distance_km: 0.0,
            elevation_gain: 0.0,
            elevation_loss: 0.0,
            max_elevation: f64::NEG_INFINITY,
            min_elevation: f64::INFINITY,
            placeholder: false,
        }
    }

    pub fn with_capacity<S: Into<String>>(name: S, capacity: usize) -> Self {
        let mut builder = Self::new(name);
        builder.points.reserve(capacity);
        builder
    }

    /// Mark the route as the degraded-mode placeholder
    #[must_use]
    pub fn placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    /// Append the next point
    pub fn push(&mut self, coordinate: Coordinate, elevation: f64, time: Option<DateTime<Utc>>) {
        if let Some(previous) = self.points.last() {
            let step = geodesic::distance_between(&previous.coordinate, &coordinate);
            // NaN or negative steps would break monotonic distances
            if step.is_finite() && step > 0.0 {
                self.total_distance_km += step;
            }

            let delta = elevation - previous.elevation;
            if delta > 0.0 {
                self.elevation_gain += delta;
            } else if delta < 0.0 {
                self.elevation_loss -= delta;
            }
        }

        self.max_elevation = self.max_elevation.max(elevation);
        self.min_elevation = self.min_elevation.min(elevation);

        self.points.push(RoutePoint {
            coordinate,
            elevation,
            time,
            distance_km: self.total_distance_km,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn build(self) -> Route {
        let (max_elevation, min_elevation) = if self.points.is_empty() {
            (0.0, 0.0)
        } else {
            (self.max_elevation, self.min_elevation)
        };

        Route {
            name: self.name,
            points: self.points,
            total_distance_km: self.total_distance_km,
            elevation_gain: self.elevation_gain,
            elevation_loss: self.elevation_loss,
            max_elevation,
            min_elevation,
            placeholder: self.placeholder,
        }
    }
}
