use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{Parser, ValueHint};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use routecast::config::RoutecastConfig;
use routecast::gpx::ParserOptions;
use routecast::models::{ForecastPoint, MergedPoint, Route, WeatherObservation};
use routecast::weather::{self, WeatherFetcher, WeatherProvider};
use routecast::{RouteParser, RouteSampler, RoutecastError, logging};

#[derive(Parser, Debug)]
#[command(author, version, about = "Weather forecasts along GPX routes", long_about = None)]
struct Cli {
    /// GPX route file
    #[arg(value_hint = ValueHint::FilePath)]
    file: PathBuf,

    /// Distance between forecast points in kilometers
    #[arg(long)]
    interval_km: Option<f64>,

    /// Average travel speed in km/h
    #[arg(long)]
    speed_kmh: Option<f64>,

    /// Departure time (RFC 3339), defaults to now
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// JSON array of recorded observations, one entry (or null) per forecast point
    #[arg(long, value_hint = ValueHint::FilePath)]
    weather: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Substitute a sample route when the file cannot be read
    #[arg(long)]
    degraded: bool,

    /// Configuration file
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Replays observations recorded earlier, in forecast point order
struct RecordedProvider {
    observations: Vec<Option<WeatherObservation>>,
    offset: AtomicUsize,
}

#[async_trait]
impl WeatherProvider for RecordedProvider {
    async fn fetch_batch(
        &self,
        points: &[ForecastPoint],
    ) -> routecast::Result<Vec<Option<WeatherObservation>>> {
        let start = self.offset.fetch_add(points.len(), Ordering::SeqCst);
        if start >= self.observations.len() {
            return Err(RoutecastError::weather("no recorded observations left"));
        }
        let end = (start + points.len()).min(self.observations.len());
        Ok(self.observations[start..end].to_vec())
    }
}

#[derive(Serialize)]
struct RouteSummary<'a> {
    name: &'a str,
    points: usize,
    distance_km: f64,
    elevation_gain: f64,
    elevation_loss: f64,
    placeholder: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    route: RouteSummary<'a>,
    interval_km: f64,
    forecast: &'a [MergedPoint],
    warnings: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<RoutecastError>() {
                Some(error) => eprintln!("{}", error.user_message()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = RoutecastConfig::load_from_path(cli.config.clone())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.degraded {
        config.parser.degraded_mode = true;
    }
    logging::init(&config.logging);

    let text = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read route file {}", cli.file.display()))?;

    let parser = RouteParser::new(ParserOptions::from(&config.parser));
    let parsed = parser.parse_with_report(&text)?;
    info!(
        "Parsed '{}' ({} points) using {} strategy",
        parsed.route.name(),
        parsed.route.point_count(),
        parsed.strategy
    );
    for repair in &parsed.repairs {
        debug!("Applied repair: {:?}", repair);
    }

    let interval_km = cli.interval_km.unwrap_or(config.sampling.interval_km);
    let speed_kmh = cli.speed_kmh.unwrap_or(config.sampling.avg_speed_kmh);
    let start = cli.start.unwrap_or_else(Utc::now);

    let sampler = RouteSampler::from(&config.sampling);
    let sampled = sampler.generate_with_report(&parsed.route, interval_km, start, speed_kmh)?;

    let observations = match &cli.weather {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read observations {}", path.display()))?;
            let recorded: Vec<Option<WeatherObservation>> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid observations file {}", path.display()))?;
            let provider = RecordedProvider {
                observations: recorded,
                offset: AtomicUsize::new(0),
            };
            WeatherFetcher::from_config(provider, &config.weather)
                .fetch_along_route(&sampled.points)
                .await
        }
        None => Vec::new(),
    };
    let merged = weather::merge(&sampled.points, &observations);

    let warnings: Vec<String> = parsed
        .warnings
        .iter()
        .chain(&sampled.warnings)
        .map(ToString::to_string)
        .collect();

    if cli.json {
        let output = Output {
            route: summarize(&parsed.route),
            interval_km: sampled.effective_interval_km,
            forecast: &merged,
            warnings,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_table(&parsed.route, &merged, &warnings);
    }

    Ok(())
}

fn summarize(route: &Route) -> RouteSummary<'_> {
    RouteSummary {
        name: route.name(),
        points: route.point_count(),
        distance_km: route.total_distance_km(),
        elevation_gain: route.elevation_gain(),
        elevation_loss: route.elevation_loss(),
        placeholder: route.is_placeholder(),
    }
}

fn print_table(route: &Route, merged: &[MergedPoint], warnings: &[String]) {
    println!(
        "{} - {:.1} km, +{:.0} m / -{:.0} m",
        route.name(),
        route.total_distance_km(),
        route.elevation_gain(),
        route.elevation_loss()
    );
    if route.is_placeholder() {
        println!("(sample route: the file could not be read)");
    }
    for warning in warnings {
        println!("warning: {warning}");
    }

    let (with_weather, total) = weather::coverage(merged);
    println!("{total} forecast points, {with_weather} with weather");
    println!();

    for point in merged {
        let weather = point.weather.as_ref().map_or_else(
            || "-".to_string(),
            |w| format!("{} {} {}", w.format_temperature(), w.format_wind(), w.description),
        );
        println!(
            "{:>8.1} km  {}  {:<20}  {}",
            point.point.distance_km,
            point.point.estimated_time.format("%Y-%m-%d %H:%M"),
            point.point.coordinate.format_coordinates(),
            weather
        );
    }
}
