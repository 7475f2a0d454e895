use thiserror::Error;

/// Everything that can go wrong between picking a coordinate and holding a
/// decoded [`WeatherInfo`](crate::WeatherInfo).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(
        "No API key configured.\n\
         Hint: run `tappy configure` and enter your OpenWeather API key."
    )]
    MissingCredential,

    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Built with the URL stripped; the query string carries the API key.
    #[error("Failed to reach OpenWeather: {0}")]
    Transport(reqwest::Error),

    #[error("OpenWeather responded with status {0}")]
    NonSuccessStatus(i64),

    #[error("Failed to decode OpenWeather response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Status code carried by a [`FetchError::NonSuccessStatus`].
    pub fn status(&self) -> Option<i64> {
        match self {
            FetchError::NonSuccessStatus(code) => Some(*code),
            _ => None,
        }
    }
}
