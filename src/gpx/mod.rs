//! GPX route parsing
//!
//! Turns the raw text of a route-exchange document into an immutable [`Route`]:
//! - Structural repairs of common defects (`repair`)
//! - Typed GPX deserialization (`document`)
//! - Pattern-based recovery for documents too damaged to deserialize (`extract`)
//! - The ordered fallback chain tying these together (`strategy`)

pub mod document;
pub mod extract;
pub mod repair;
pub mod strategy;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::ParserConfig;
use crate::error::ProcessingLimitWarning;
use crate::models::{Coordinate, Route, RouteBuilder};
use crate::{Result, RoutecastError};

pub use repair::{DEFAULT_NAMESPACES, Repair};
pub use strategy::{PLACEHOLDER_ROUTE_NAME, ParseStrategy};

/// Name given to routes whose document carries no name at all
pub const DEFAULT_ROUTE_NAME: &str = "Unnamed Route";

/// Ceiling on processed points, bounding memory and time on pathological input
pub const DEFAULT_MAX_POINTS: usize = 50_000;

/// A point as found in the document, before any numeric interpretation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPoint {
    pub lat: String,
    pub lon: String,
    pub ele: Option<String>,
    pub time: Option<String>,
}

/// Name and ordered points recovered by one of the parse strategies
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRoute {
    pub name: Option<String>,
    pub points: Vec<RawPoint>,
}

/// Parser settings
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Points beyond this count are dropped with a warning
    pub max_points: usize,
    /// Substitute the sample route instead of failing when nothing can be recovered
    pub degraded_mode: bool,
    /// Namespace prefix to URI table used to declare missing prefixes
    pub namespaces: &'static [(&'static str, &'static str)],
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            degraded_mode: false,
            namespaces: DEFAULT_NAMESPACES,
        }
    }
}

impl From<&ParserConfig> for ParserOptions {
    fn from(config: &ParserConfig) -> Self {
        Self {
            max_points: config.max_points,
            degraded_mode: config.degraded_mode,
            ..Self::default()
        }
    }
}

/// Parsed route together with how it was obtained
#[derive(Debug, Clone)]
pub struct ParseReport {
    pub route: Route,
    pub strategy: ParseStrategy,
    pub repairs: Vec<Repair>,
    pub warnings: Vec<ProcessingLimitWarning>,
}

/// Route document parser
#[derive(Debug, Clone, Default)]
pub struct RouteParser {
    options: ParserOptions,
}

impl RouteParser {
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse document text into a route
    pub fn parse(&self, text: &str) -> Result<Route> {
        self.parse_with_report(text).map(|report| report.route)
    }

    /// Parse document text, reporting the strategy, repairs and warnings involved
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub fn parse_with_report(&self, text: &str) -> Result<ParseReport> {
        if text.trim().is_empty() {
            return Err(RoutecastError::validation("Route document is empty"));
        }

        let (repaired, repairs) = repair::repair(text, self.options.namespaces);

        let mut failures = Vec::new();
        for (strategy, attempt) in strategy::FALLBACK_CHAIN {
            match attempt(&repaired) {
                Ok(raw) => {
                    if *strategy != ParseStrategy::Structured {
                        info!("Recovered route using {} parsing", strategy);
                    }
                    return Ok(self.finish(raw, *strategy, repairs));
                }
                Err(e) => {
                    debug!("{} parsing failed: {}", strategy, e);
                    failures.push(format!("{strategy}: {e}"));
                }
            }
        }

        if self.options.degraded_mode {
            warn!(
                "No route could be recovered ({}); substituting the placeholder sample route",
                failures.join("; ")
            );
            return Ok(self.finish(strategy::placeholder(), ParseStrategy::Placeholder, repairs));
        }

        Err(RoutecastError::parse(format!(
            "No route points could be extracted ({})",
            failures.join("; ")
        )))
    }

    fn finish(&self, raw: RawRoute, strategy: ParseStrategy, repairs: Vec<Repair>) -> ParseReport {
        let (route, warnings) = build_route(
            raw,
            self.options.max_points,
            strategy == ParseStrategy::Placeholder,
        );
        info!(
            "Parsed route '{}': {} points, {:.2} km ({} strategy)",
            route.name(),
            route.point_count(),
            route.total_distance_km(),
            strategy
        );
        ParseReport {
            route,
            strategy,
            repairs,
            warnings,
        }
    }
}

/// Parse a document with the default parser options
pub fn parse(text: &str) -> Result<Route> {
    RouteParser::default().parse(text)
}

fn build_route(
    raw: RawRoute,
    max_points: usize,
    placeholder: bool,
) -> (Route, Vec<ProcessingLimitWarning>) {
    let name = raw
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ROUTE_NAME.to_string());

    let total = raw.points.len();
    let kept = total.min(max_points);
    let mut warnings = Vec::new();
    if kept < total {
        let warning = ProcessingLimitWarning::PointsTruncated {
            kept,
            dropped: total - kept,
        };
        warn!("{}", warning);
        warnings.push(warning);
    }

    let mut builder = RouteBuilder::with_capacity(name, kept);
    if placeholder {
        builder = builder.placeholder();
    }

    let mut out_of_range = 0;
    for point in raw.points.into_iter().take(kept) {
        let coordinate = Coordinate::new(parse_number(&point.lat), parse_number(&point.lon));
        if !coordinate.is_valid() {
            out_of_range += 1;
        }
        let elevation = point.ele.as_deref().map_or(0.0, parse_number);
        let time = point.time.as_deref().and_then(parse_time);
        builder.push(coordinate, elevation, time);
    }
    if out_of_range > 0 {
        debug!("{} points have coordinates outside the valid range", out_of_range);
    }

    (builder.build(), warnings)
}

/// Malformed or non-finite numbers read as zero
fn parse_number(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .unwrap_or(0.0)
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}
