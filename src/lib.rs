//! `RouteCast` - weather forecasts along GPS routes
//!
//! This library reads GPX route files (repairing the damage common in real-world exports),
//! samples forecast points along the route at a fixed distance interval with estimated
//! arrival times, and merges provider weather observations back onto those points.

pub mod config;
pub mod error;
pub mod geodesic;
pub mod gpx;
pub mod logging;
pub mod models;
pub mod sampler;
pub mod weather;

// Re-export core types for public API
pub use config::RoutecastConfig;
pub use error::{ProcessingLimitWarning, RoutecastError};
pub use gpx::{ParseReport, ParseStrategy, ParserOptions, RouteParser};
pub use models::{Coordinate, ForecastPoint, MergedPoint, Route, RoutePoint, WeatherObservation};
pub use sampler::{RouteSampler, SampleReport};
pub use weather::{WeatherFetcher, WeatherProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, RoutecastError>;
