//! Configuration management for `RouteCast`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::RoutecastError;
use crate::gpx::DEFAULT_MAX_POINTS;
use crate::sampler::{DEFAULT_MAX_FORECAST_POINTS, MAX_INTERVAL_KM, MAX_SPEED_KMH, MIN_SPEED_KMH};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutecastConfig {
    /// Route file parsing
    pub parser: ParserConfig,
    /// Forecast point sampling
    pub sampling: SamplingConfig,
    /// Weather fetching
    pub weather: WeatherConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Route parser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum number of route points kept from a file
    pub max_points: usize,
    /// Fall back to a sample route when a file cannot be read at all
    pub degraded_mode: bool,
}

/// Forecast sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Distance between forecast points
    pub interval_km: f64,
    /// Assumed average travel speed
    pub avg_speed_kmh: f64,
    /// Ceiling on forecast points per route
    pub max_forecast_points: usize,
}

/// Weather fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Forecast points per provider request
    pub batch_size: usize,
    /// Maximum number of retries for failed requests
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub retry_base_delay_ms: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

fn default_interval_km() -> f64 {
    10.0
}

fn default_avg_speed_kmh() -> f64 {
    20.0
}

fn default_batch_size() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            degraded_mode: false,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_km: default_interval_km(),
            avg_speed_kmh: default_avg_speed_kmh(),
            max_forecast_points: DEFAULT_MAX_FORECAST_POINTS,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RoutecastConfig {
    /// Load configuration from the default file location and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // ROUTECAST_SAMPLING__INTERVAL_KM=5 overrides sampling.interval_km
        builder = builder.add_source(
            Environment::with_prefix("ROUTECAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: RoutecastConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to deserialize configuration from {}", config_file.display()))?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("routecast").join("config.toml"))
    }

    /// Apply default values to empty or zero configuration fields
    pub fn apply_defaults(&mut self) {
        if self.parser.max_points == 0 {
            self.parser.max_points = DEFAULT_MAX_POINTS;
        }
        if self.sampling.interval_km == 0.0 {
            self.sampling.interval_km = default_interval_km();
        }
        if self.sampling.avg_speed_kmh == 0.0 {
            self.sampling.avg_speed_kmh = default_avg_speed_kmh();
        }
        if self.sampling.max_forecast_points == 0 {
            self.sampling.max_forecast_points = DEFAULT_MAX_FORECAST_POINTS;
        }
        if self.weather.batch_size == 0 {
            self.weather.batch_size = default_batch_size();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> crate::Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> crate::Result<()> {
        if !(1..=1_000_000).contains(&self.parser.max_points) {
            return Err(RoutecastError::config(
                "Parser max points must be between 1 and 1000000",
            ));
        }

        if !(self.sampling.interval_km > 0.0 && self.sampling.interval_km <= MAX_INTERVAL_KM) {
            return Err(RoutecastError::config(format!(
                "Sampling interval must be greater than 0 and at most {MAX_INTERVAL_KM} km"
            )));
        }

        if !(MIN_SPEED_KMH..=MAX_SPEED_KMH).contains(&self.sampling.avg_speed_kmh) {
            return Err(RoutecastError::config(format!(
                "Average speed must be between {MIN_SPEED_KMH} and {MAX_SPEED_KMH} km/h"
            )));
        }

        if !(2..=5000).contains(&self.sampling.max_forecast_points) {
            return Err(RoutecastError::config(
                "Max forecast points must be between 2 and 5000",
            ));
        }

        if self.weather.max_retries > 10 {
            return Err(RoutecastError::config(
                "Weather max retries cannot exceed 10",
            ));
        }

        if self.weather.retry_base_delay_ms > 60_000 {
            return Err(RoutecastError::config(
                "Weather retry delay cannot exceed 60000 ms",
            ));
        }

        Ok(())
    }

    fn validate_string_values(&self) -> crate::Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(RoutecastError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(RoutecastError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            )));
        }

        Ok(())
    }
}
