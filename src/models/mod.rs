//! Data models for the RouteCast pipeline
//!
//! This module contains the core domain models organized by concern:
//! - Coordinate: Geographic positions
//! - Route: Parsed route points with distance and elevation statistics
//! - Forecast: Points sampled along a route and their merged weather
//! - Weather: Observations supplied by the weather provider

pub mod coordinate;
pub mod forecast;
pub mod route;
pub mod weather;

// Re-export all public types for convenient access
pub use coordinate::Coordinate;
pub use forecast::{ForecastPoint, MergedPoint};
pub use route::{AlongRoute, Bounds, Route, RouteBuilder, RoutePoint};
pub use weather::WeatherObservation;
