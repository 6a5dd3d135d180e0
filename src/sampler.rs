//! Forecast point sampling along a route
//!
//! Resamples a route into points spaced at a fixed distance interval, each with an
//! estimated arrival time derived from an assumed average speed.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument, warn};

use crate::config::SamplingConfig;
use crate::error::ProcessingLimitWarning;
use crate::models::{Coordinate, ForecastPoint, Route};
use crate::{Result, RoutecastError};

/// Ceiling on emitted forecast points, start and end included
pub const DEFAULT_MAX_FORECAST_POINTS: usize = 500;
/// Largest accepted sampling interval
pub const MAX_INTERVAL_KM: f64 = 1000.0;
/// Smallest accepted average speed
pub const MIN_SPEED_KMH: f64 = 0.1;
/// Largest accepted average speed
pub const MAX_SPEED_KMH: f64 = 300.0;

/// Sampled points with the interval actually used
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub points: Vec<ForecastPoint>,
    /// Differs from the requested interval when the point ceiling forced a wider one
    pub effective_interval_km: f64,
    pub warnings: Vec<ProcessingLimitWarning>,
}

/// Generates forecast points along routes
#[derive(Debug, Clone)]
pub struct RouteSampler {
    max_points: usize,
}

impl Default for RouteSampler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FORECAST_POINTS)
    }
}

impl From<&SamplingConfig> for RouteSampler {
    fn from(config: &SamplingConfig) -> Self {
        Self::new(config.max_forecast_points)
    }
}

impl RouteSampler {
    /// Create a sampler emitting at most `max_points` points, start and end included.
    /// The ceiling is never below 2.
    #[must_use]
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(2),
        }
    }

    #[must_use]
    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Forecast points every `interval_km` from the start, plus the route end
    pub fn generate(
        &self,
        route: &Route,
        interval_km: f64,
        start_time: DateTime<Utc>,
        avg_speed_kmh: f64,
    ) -> Result<Vec<ForecastPoint>> {
        self.generate_with_report(route, interval_km, start_time, avg_speed_kmh)
            .map(|report| report.points)
    }

    #[instrument(skip(self, route), fields(route = route.name(), points = route.point_count()))]
    pub fn generate_with_report(
        &self,
        route: &Route,
        interval_km: f64,
        start_time: DateTime<Utc>,
        avg_speed_kmh: f64,
    ) -> Result<SampleReport> {
        validate_parameters(interval_km, avg_speed_kmh)?;

        let (Some(first), Some(last)) = (route.start(), route.end()) else {
            return Ok(SampleReport {
                points: Vec::new(),
                effective_interval_km: interval_km,
                warnings: Vec::new(),
            });
        };

        let total = route.total_distance_km();
        let mut interval = interval_km;
        let mut warnings = Vec::new();

        let naive_count = interior_count(total, interval).saturating_add(2);
        if naive_count > self.max_points {
            interval = total / (self.max_points - 1) as f64;
            let warning = ProcessingLimitWarning::IntervalWidened {
                requested_km: interval_km,
                effective_km: interval,
                ceiling: self.max_points,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        let eta = |distance_km: f64| estimated_time(start_time, distance_km, avg_speed_kmh);
        // the final ETA is the latest, so checking it first rejects out-of-range routes up front
        let end_time = eta(total)?;

        let mut points = Vec::with_capacity(naive_count.min(self.max_points));
        points.push(ForecastPoint::new(first.coordinate, 0.0, start_time));

        let mut step: u32 = 1;
        loop {
            let target = f64::from(step) * interval;
            if target >= total || points.len() >= self.max_points - 1 {
                break;
            }
            points.push(ForecastPoint::new(
                interpolate(route, target),
                target,
                eta(target)?,
            ));
            step += 1;
        }

        points.push(ForecastPoint::new(last.coordinate, total, end_time));

        debug!(
            "Generated {} forecast points every {:.3} km",
            points.len(),
            interval
        );

        Ok(SampleReport {
            points,
            effective_interval_km: interval,
            warnings,
        })
    }
}

/// Generate forecast points with the default point ceiling
pub fn generate(
    route: &Route,
    interval_km: f64,
    start_time: DateTime<Utc>,
    avg_speed_kmh: f64,
) -> Result<Vec<ForecastPoint>> {
    RouteSampler::default().generate(route, interval_km, start_time, avg_speed_kmh)
}

fn validate_parameters(interval_km: f64, avg_speed_kmh: f64) -> Result<()> {
    if !(interval_km > 0.0 && interval_km <= MAX_INTERVAL_KM) {
        return Err(RoutecastError::validation(format!(
            "Forecast interval must be greater than 0 and at most {MAX_INTERVAL_KM} km, got {interval_km}"
        )));
    }
    if !(MIN_SPEED_KMH..=MAX_SPEED_KMH).contains(&avg_speed_kmh) {
        return Err(RoutecastError::validation(format!(
            "Average speed must be between {MIN_SPEED_KMH} and {MAX_SPEED_KMH} km/h, got {avg_speed_kmh}"
        )));
    }
    Ok(())
}

/// Number of targets strictly between the start and `total`
fn interior_count(total: f64, interval: f64) -> usize {
    if total <= 0.0 {
        return 0;
    }
    let steps = (total / interval).ceil();
    if steps >= usize::MAX as f64 {
        usize::MAX
    } else {
        (steps as usize).saturating_sub(1)
    }
}

/// Position at `target_km` by linear interpolation between the bracketing route points.
///
/// Requires `0 < target_km < total distance`.
fn interpolate(route: &Route, target_km: f64) -> Coordinate {
    let points = route.points();
    let upper_index = points
        .partition_point(|point| point.distance_km < target_km)
        .clamp(1, points.len() - 1);
    let lower = &points[upper_index - 1];
    let upper = &points[upper_index];

    let span = upper.distance_km - lower.distance_km;
    let fraction = if span > 0.0 {
        ((target_km - lower.distance_km) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    lower.coordinate.lerp(&upper.coordinate, fraction)
}

/// Arrival time at `distance_km`; fails when it falls outside the representable date range
fn estimated_time(
    start_time: DateTime<Utc>,
    distance_km: f64,
    avg_speed_kmh: f64,
) -> Result<DateTime<Utc>> {
    let out_of_range = || {
        RoutecastError::validation(format!(
            "Arrival after {distance_km:.1} km at {avg_speed_kmh} km/h is outside the supported date range"
        ))
    };

    let millis = (distance_km / avg_speed_kmh * 3_600_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    let offset = Duration::try_milliseconds(millis as i64).ok_or_else(out_of_range)?;
    start_time.checked_add_signed(offset).ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteBuilder;
    use chrono::TimeZone;
    use rstest::rstest;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    /// Straight line along the equator, one point per 0.1 degree (about 11.1 km)
    fn equator_route(points: usize) -> Route {
        let mut builder = RouteBuilder::new("Equator");
        for i in 0..points {
            builder.push(Coordinate::new(0.0, i as f64 * 0.1), 0.0, None);
        }
        builder.build()
    }

    fn seattle_route() -> Route {
        let mut builder = RouteBuilder::new("Seattle");
        builder.push(Coordinate::new(47.6062, -122.3321), 100.0, None);
        builder.push(Coordinate::new(47.6063, -122.3322), 110.0, None);
        builder.push(Coordinate::new(47.6064, -122.3323), 120.0, None);
        builder.build()
    }

    #[rstest]
    #[case(0.0, 20.0)]
    #[case(-5.0, 20.0)]
    #[case(f64::NAN, 20.0)]
    #[case(MAX_INTERVAL_KM + 1.0, 20.0)]
    #[case(10.0, 0.0)]
    #[case(10.0, -1.0)]
    #[case(10.0, f64::INFINITY)]
    #[case(10.0, MAX_SPEED_KMH + 1.0)]
    #[case(10.0, 1e-9)]
    #[case(10.0, MIN_SPEED_KMH / 2.0)]
    fn test_invalid_parameters_are_rejected(#[case] interval: f64, #[case] speed: f64) {
        let result = generate(&seattle_route(), interval, start(), speed);
        assert!(matches!(result, Err(RoutecastError::Validation { .. })));
    }

    #[test]
    fn test_empty_route_yields_no_points() {
        let route = RouteBuilder::new("Empty").build();
        assert!(generate(&route, 5.0, start(), 20.0).unwrap().is_empty());
    }

    #[test]
    fn test_interval_longer_than_route_yields_start_and_end() {
        let route = seattle_route();
        let points = generate(&route, 10.0, start(), 20.0).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].coordinate, Coordinate::new(47.6062, -122.3321));
        assert_eq!(points[0].distance_km, 0.0);
        assert_eq!(points[0].estimated_time, start());
        assert_eq!(points[1].coordinate, Coordinate::new(47.6064, -122.3323));
        assert_eq!(points[1].distance_km, route.total_distance_km());
    }

    #[test]
    fn test_single_point_route_duplicates_the_point() {
        let mut builder = RouteBuilder::new("Single");
        builder.push(Coordinate::new(46.0, 8.0), 0.0, None);
        let route = builder.build();

        let points = generate(&route, 1.0, start(), 20.0).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].coordinate, points[1].coordinate);
        assert_eq!(points[0].distance_km, 0.0);
        assert_eq!(points[1].distance_km, 0.0);
        assert_eq!(points[1].estimated_time, start());
    }

    #[test]
    fn test_points_are_evenly_spaced_with_end_point() {
        let route = equator_route(11);
        let total = route.total_distance_km();
        let points = generate(&route, 25.0, start(), 25.0).unwrap();

        // about 111 km: targets at 25, 50, 75, 100 plus start and end
        assert_eq!(points.len(), 6);
        assert_eq!(points.first().unwrap().distance_km, 0.0);
        assert_eq!(points.last().unwrap().distance_km, total);
        assert!(points.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));

        assert_eq!(points[1].distance_km, 25.0);
        assert_eq!(points[1].estimated_time, start() + Duration::hours(1));
        assert_eq!(points[4].estimated_time, start() + Duration::hours(4));
    }

    #[test]
    fn test_interpolated_position_lies_on_the_line() {
        let route = equator_route(11);
        let points = generate(&route, 25.0, start(), 20.0).unwrap();

        let expected_lon = 25.0 / route.total_distance_km();
        assert!(points[1].coordinate.latitude.abs() < 1e-12);
        assert!((points[1].coordinate.longitude - expected_lon).abs() < 1e-6);
    }

    #[test]
    fn test_ceiling_widens_interval() {
        let route = equator_route(11);
        let sampler = RouteSampler::new(5);
        let report = sampler
            .generate_with_report(&route, 1.0, start(), 20.0)
            .unwrap();

        assert_eq!(report.points.len(), 5);
        assert!((report.effective_interval_km - route.total_distance_km() / 4.0).abs() < 1e-9);
        assert!(matches!(
            report.warnings.as_slice(),
            [ProcessingLimitWarning::IntervalWidened { ceiling: 5, .. }]
        ));
        assert_eq!(report.points.last().unwrap().distance_km, route.total_distance_km());
    }

    #[test]
    fn test_slowest_accepted_speed_is_sampled() {
        let route = equator_route(11);
        let points = generate(&route, 25.0, start(), MIN_SPEED_KMH).unwrap();

        assert_eq!(points.len(), 6);
        assert_eq!(points[1].estimated_time, start() + Duration::hours(250));
        assert!(points.windows(2).all(|w| w[0].estimated_time <= w[1].estimated_time));
    }

    #[test]
    fn test_arrival_beyond_date_range_is_rejected() {
        // about 20 000 km per leg, far enough that the slowest speed runs past year 262 143
        let mut builder = RouteBuilder::new("Antipodes");
        for i in 0..12_000 {
            let longitude = if i % 2 == 0 { 0.0 } else { 180.0 };
            builder.push(Coordinate::new(0.0, longitude), 0.0, None);
        }
        let route = builder.build();

        let result = generate(&route, MAX_INTERVAL_KM, start(), MIN_SPEED_KMH);
        assert!(matches!(result, Err(RoutecastError::Validation { .. })));
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(7)]
    #[case(DEFAULT_MAX_FORECAST_POINTS)]
    fn test_ceiling_is_inclusive(#[case] ceiling: usize) {
        let route = equator_route(101);
        let points = RouteSampler::new(ceiling)
            .generate(&route, 0.5, start(), 20.0)
            .unwrap();

        assert!(points.len() <= ceiling, "{} points for ceiling {ceiling}", points.len());
        assert!(points.len() >= 2);
        assert_eq!(points.last().unwrap().distance_km, route.total_distance_km());
    }

    #[test]
    fn test_final_eta_uses_total_distance() {
        let route = equator_route(11);
        let points = generate(&route, 50.0, start(), 10.0).unwrap();
        let last = points.last().unwrap();
        let expected = estimated_time(start(), route.total_distance_km(), 10.0).unwrap();
        assert_eq!(last.estimated_time, expected);
        assert_eq!(last.unix_timestamp(), expected.timestamp());
    }
}
