//! Weather observation model and display methods

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weather reported by the provider for one forecast point
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherObservation {
    /// Temperature in Celsius
    pub temperature: f32,
    /// Apparent temperature in Celsius
    pub feels_like: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Atmospheric pressure in hPa
    pub pressure: f32,
    /// Wind speed in m/s
    pub wind_speed: f32,
    /// Wind direction in degrees (0-360, where 0/360 is North)
    pub wind_direction: u16,
    /// Precipitation amount in mm
    pub precipitation: f32,
    pub uv_index: f32,
    /// Human-readable description of weather conditions
    pub description: String,
    /// Weather condition icon ID from the provider
    pub icon: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// IANA timezone name of the observation location
    #[serde(default)]
    pub timezone: Option<String>,
}

impl WeatherObservation {
    /// Convert wind direction from degrees to cardinal direction
    #[must_use]
    pub fn wind_direction_to_cardinal(degrees: u16) -> &'static str {
        match degrees {
            0..=11 | 349..=360 => "N",
            12..=33 => "NNE",
            34..=56 => "NE",
            57..=78 => "ENE",
            79..=101 => "E",
            102..=123 => "ESE",
            124..=146 => "SE",
            147..=168 => "SSE",
            169..=191 => "S",
            192..=213 => "SSW",
            214..=236 => "SW",
            237..=258 => "WSW",
            259..=281 => "W",
            282..=303 => "WNW",
            304..=326 => "NW",
            327..=348 => "NNW",
            _ => "Unknown",
        }
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temperature)
    }

    /// Format wind information
    #[must_use]
    pub fn format_wind(&self) -> String {
        let direction = Self::wind_direction_to_cardinal(self.wind_direction);
        format!("{:.1} m/s {}", self.wind_speed, direction)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn observation(temperature: f32) -> WeatherObservation {
        WeatherObservation {
            temperature,
            feels_like: temperature - 1.0,
            humidity: 60.0,
            pressure: 1013.0,
            wind_speed: 3.5,
            wind_direction: 270,
            precipitation: 0.0,
            uv_index: 4.0,
            description: "Clear sky".to_string(),
            icon: "01d".to_string(),
            timestamp: None,
            timezone: None,
        }
    }

    #[test]
    fn test_wind_direction_to_cardinal() {
        assert_eq!(WeatherObservation::wind_direction_to_cardinal(0), "N");
        assert_eq!(WeatherObservation::wind_direction_to_cardinal(90), "E");
        assert_eq!(WeatherObservation::wind_direction_to_cardinal(180), "S");
        assert_eq!(WeatherObservation::wind_direction_to_cardinal(270), "W");
        assert_eq!(WeatherObservation::wind_direction_to_cardinal(45), "NE");
        assert_eq!(WeatherObservation::wind_direction_to_cardinal(400), "Unknown");
    }

    #[test]
    fn test_formatting() {
        let weather = observation(15.0);
        assert_eq!(weather.format_temperature(), "15.0°C");
        assert_eq!(weather.format_wind(), "3.5 m/s W");
    }

    #[test]
    fn test_deserialize_camel_case_without_optional_fields() {
        let json = r#"{
            "temperature": 12.5, "feelsLike": 11.0, "humidity": 70, "pressure": 1008,
            "windSpeed": 5.2, "windDirection": 180, "precipitation": 0.4, "uvIndex": 2,
            "description": "Light rain", "icon": "10d"
        }"#;
        let weather: WeatherObservation = serde_json::from_str(json).unwrap();
        assert_eq!(weather.wind_direction, 180);
        assert!(weather.timestamp.is_none());
    }
}
