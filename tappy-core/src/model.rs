use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A validated query location in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, FetchError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !valid {
            return Err(FetchError::InvalidCoordinate { latitude, longitude });
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// One decoded response of the current-weather endpoint.
///
/// Field names follow the domain; the `rename` attributes are the wire
/// mapping, shared by encoding and decoding. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    #[serde(rename = "coord")]
    pub coordinates: Coordinates,
    #[serde(rename = "weather")]
    pub conditions: Vec<WeatherCondition>,
    #[serde(rename = "main")]
    pub atmospheric: AtmosphericInfo,
}

/// Coordinates echoed back by the API. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherCondition {
    #[serde(rename = "id")]
    pub identifier: i64,
    #[serde(rename = "main")]
    pub name: String,
    pub description: String,
    #[serde(rename = "icon")]
    pub icon_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericInfo {
    #[serde(rename = "temp")]
    pub temperature_kelvin: f64,
    /// hPa
    pub pressure: f64,
    /// Percent
    pub humidity: f64,
}

impl WeatherInfo {
    /// The first reported condition, if any.
    pub fn primary_condition(&self) -> Option<&WeatherCondition> {
        self.conditions.first()
    }
}
