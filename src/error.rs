//! Error types and handling for `RouteCast`

use thiserror::Error;

/// Main error type for the `RouteCast` library
#[derive(Error, Debug)]
pub enum RoutecastError {
    /// Caller-supplied input or parameters are invalid
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The route document could not be turned into a route
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Weather provider errors
    #[error("Weather provider error: {message}")]
    Weather { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RoutecastError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new weather provider error
    pub fn weather<S: Into<String>>(message: S) -> Self {
        Self::Weather {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RoutecastError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            RoutecastError::Parse { .. } => {
                "The route file could not be read. Please check it is a valid GPX file and try again."
                    .to_string()
            }
            RoutecastError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            RoutecastError::Weather { .. } => {
                "Unable to load weather data. Please try again later.".to_string()
            }
            RoutecastError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

/// Soft condition raised when a processing ceiling was hit.
///
/// Never returned as an error: processing continues with reduced fidelity and the
/// warning is logged and attached to the operation's report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingLimitWarning {
    #[error("route truncated to {kept} points ({dropped} points dropped)")]
    PointsTruncated { kept: usize, dropped: usize },

    #[error(
        "forecast interval widened from {requested_km} km to {effective_km:.3} km to stay within {ceiling} points"
    )]
    IntervalWidened {
        requested_km: f64,
        effective_km: f64,
        ceiling: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let validation_err = RoutecastError::validation("interval must be positive");
        assert!(matches!(validation_err, RoutecastError::Validation { .. }));

        let parse_err = RoutecastError::parse("no points");
        assert!(matches!(parse_err, RoutecastError::Parse { .. }));

        let config_err = RoutecastError::config("bad level");
        assert!(matches!(config_err, RoutecastError::Config { .. }));
    }

    #[test]
    fn test_user_messages() {
        let validation_err = RoutecastError::validation("empty input");
        assert!(validation_err.user_message().contains("empty input"));

        let parse_err = RoutecastError::parse("test");
        assert!(parse_err.user_message().contains("try again"));

        let weather_err = RoutecastError::weather("timeout");
        assert!(weather_err.user_message().contains("weather"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RoutecastError = io_err.into();
        assert!(matches!(err, RoutecastError::Io { .. }));
    }

    #[test]
    fn test_warning_display() {
        let warning = ProcessingLimitWarning::PointsTruncated {
            kept: 10,
            dropped: 5,
        };
        assert_eq!(
            warning.to_string(),
            "route truncated to 10 points (5 points dropped)"
        );
    }
}
