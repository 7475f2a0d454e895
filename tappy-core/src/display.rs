//! Projection of a [`WeatherInfo`] into display values, and the state that
//! holds the last successfully projected value.

use serde::Serialize;
use tokio::sync::watch;

use crate::{error::FetchError, model::WeatherInfo};

const KELVIN_OFFSET: f64 = 273.15;

/// Kelvin to whole degrees Celsius, rounded half away from zero.
pub fn kelvin_to_celsius(kelvin: f64) -> i64 {
    (kelvin - KELVIN_OFFSET).round() as i64
}

/// Kelvin to whole degrees Fahrenheit, rounded half away from zero.
pub fn kelvin_to_fahrenheit(kelvin: f64) -> i64 {
    (kelvin * 9.0 / 5.0 - 459.67).round() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherDisplay {
    pub celsius: i64,
    pub fahrenheit: i64,
    /// Name of the first condition; `None` when the API sent none.
    pub condition: Option<String>,
    pub description: Option<String>,
    pub pressure: f64,
    pub humidity: f64,
}

impl WeatherInfo {
    pub fn display(&self) -> WeatherDisplay {
        let kelvin = self.atmospheric.temperature_kelvin;
        let primary = self.primary_condition();

        WeatherDisplay {
            celsius: kelvin_to_celsius(kelvin),
            fahrenheit: kelvin_to_fahrenheit(kelvin),
            condition: primary.map(|c| c.name.clone()),
            description: primary.map(|c| c.description.clone()),
            pressure: self.atmospheric.pressure,
            humidity: self.atmospheric.humidity,
        }
    }
}

/// Owner of the currently displayed weather.
///
/// Fetches run elsewhere; their results are handed to [`DisplayState::publish`]
/// by the task that owns this value. A failed fetch never clears what is
/// already shown.
#[derive(Debug)]
pub struct DisplayState {
    tx: watch::Sender<Option<WeatherDisplay>>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Apply one fetch result. Returns `true` when the displayed value changed.
    pub fn publish(&self, result: Result<WeatherInfo, FetchError>) -> bool {
        match result {
            Ok(info) => {
                let shown = info.display();
                tracing::debug!(?shown, "publishing weather");
                self.tx.send_replace(Some(shown));
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "weather fetch failed, keeping previous display");
                false
            }
        }
    }

    pub fn current(&self) -> Option<WeatherDisplay> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<WeatherDisplay>> {
        self.tx.subscribe()
    }
}
