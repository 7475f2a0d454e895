use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{
    error::FetchError,
    model::{Coordinate, WeatherInfo},
};

pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

const SUCCESS_STATUS: i64 = 200;

/// Current-weather client for OpenWeather.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    endpoint: String,
    http: Client,
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherClient {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Point the client at another base URL, e.g. a proxy or a mock server.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: Client::new(),
        }
    }

    /// Fetch the current weather at `coordinate`. One request, no retries.
    pub async fn fetch_weather(
        &self,
        coordinate: Coordinate,
        api_key: &str,
    ) -> Result<WeatherInfo, FetchError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(FetchError::MissingCredential);
        }

        tracing::debug!(%coordinate, endpoint = %self.endpoint, "requesting current weather");

        let res = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("APPID", api_key.to_string()),
                ("lat", coordinate.latitude().to_string()),
                ("lon", coordinate.longitude().to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let http_status = res.status();
        let body = res.text().await.map_err(transport_error)?;

        let info = match decode_weather(&body) {
            // The body had no usable `cod`; fall back to the transport status.
            Err(FetchError::Decode(_)) if !http_status.is_success() => {
                tracing::debug!(body = %truncate_body(&body), "unparseable error body");
                Err(FetchError::NonSuccessStatus(i64::from(http_status.as_u16())))
            }
            other => other,
        }?;

        tracing::info!(
            %coordinate,
            conditions = info.conditions.len(),
            "decoded weather"
        );
        Ok(info)
    }

    /// Run [`WeatherClient::fetch_weather`] on the runtime. The caller awaits
    /// the handle and publishes the result from its own task.
    pub fn spawn_fetch(
        &self,
        coordinate: Coordinate,
        api_key: String,
    ) -> JoinHandle<Result<WeatherInfo, FetchError>> {
        let client = self.clone();
        tokio::spawn(async move { client.fetch_weather(coordinate, &api_key).await })
    }
}

/// Check the `cod` field of a response body and decode it.
///
/// A `cod` other than 200 is reported as [`FetchError::NonSuccessStatus`]
/// without looking at the rest of the body.
pub fn decode_weather(body: &str) -> Result<WeatherInfo, FetchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Decode(format!("body is not JSON: {e}")))?;

    let status = response_status(&value)
        .ok_or_else(|| FetchError::Decode("missing or non-numeric `cod` field".to_string()))?;

    if status != SUCCESS_STATUS {
        return Err(FetchError::NonSuccessStatus(status));
    }

    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

/// OpenWeather sends `cod` as a number on success but as a string on
/// several error paths, e.g. `"cod": "404"`.
fn response_status(value: &Value) -> Option<i64> {
    match value.get("cod")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.without_url())
}

fn truncate_body(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn success_body() -> serde_json::Value {
        serde_json::json!({
            "coord": { "lon": -122.08, "lat": 37.39 },
            "weather": [
                { "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }
            ],
            "main": { "temp": 282.55, "feels_like": 281.86, "pressure": 1023, "humidity": 100 },
            "name": "Mountain View",
            "cod": 200
        })
    }

    fn coordinate() -> Coordinate {
        Coordinate::new(37.39, -122.08).unwrap()
    }

    #[test]
    fn decode_success_payload() {
        let info = decode_weather(&success_body().to_string()).unwrap();

        assert_eq!(info.coordinates.latitude, 37.39);
        assert_eq!(info.coordinates.longitude, -122.08);
        assert_eq!(info.conditions[0].name, "Clear");
        assert_eq!(info.atmospheric.temperature_kelvin, 282.55);
        assert_eq!(info.atmospheric.pressure, 1023.0);
        assert_eq!(info.atmospheric.humidity, 100.0);
    }

    #[test]
    fn decode_reports_non_success_cod() {
        let body = r#"{"cod":401,"message":"Invalid API key."}"#;
        let err = decode_weather(body).unwrap_err();
        assert_eq!(err.status(), Some(401));

        let body = r#"{"cod":"404","message":"city not found"}"#;
        let err = decode_weather(body).unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn decode_missing_main_is_decode_error() {
        let mut body = success_body();
        body.as_object_mut().unwrap().remove("main");

        let err = decode_weather(&body.to_string()).unwrap_err();
        match err {
            FetchError::Decode(detail) => assert!(detail.contains("main"), "{detail}"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn decode_mistyped_field_is_decode_error() {
        let mut body = success_body();
        body["main"]["temp"] = serde_json::json!("warm");

        let err = decode_weather(&body.to_string()).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn decode_without_cod_or_json_is_decode_error() {
        assert!(matches!(decode_weather("<html>"), Err(FetchError::Decode(_))));
        assert!(matches!(decode_weather(r#"{"coord":{}}"#), Err(FetchError::Decode(_))));
    }

    #[test]
    fn decode_empty_weather_list_is_fine() {
        let mut body = success_body();
        body["weather"] = serde_json::json!([]);

        let info = decode_weather(&body.to_string()).unwrap();
        assert!(info.conditions.is_empty());
        assert!(info.display().condition.is_none());
    }

    #[tokio::test]
    async fn fetch_sends_key_and_coordinate() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("APPID", "secret"))
            .and(query_param("lat", "37.39"))
            .and(query_param("lon", "-122.08"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = WeatherClient::with_endpoint(server.uri());
        let info = client.fetch_weather(coordinate(), "secret").await.unwrap();

        assert_eq!(info.conditions[0].description, "clear sky");
        assert_eq!(info.display().celsius, 9);
    }

    #[tokio::test]
    async fn fetch_reports_api_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "cod": 401,
                "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
            })))
            .mount(&server)
            .await;

        let client = WeatherClient::with_endpoint(server.uri());
        let err = client.fetch_weather(coordinate(), "bad").await.unwrap_err();

        assert!(matches!(err, FetchError::NonSuccessStatus(401)));
    }

    #[tokio::test]
    async fn fetch_falls_back_to_http_status_for_opaque_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client = WeatherClient::with_endpoint(server.uri());
        let err = client.fetch_weather(coordinate(), "key").await.unwrap_err();

        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn fetch_missing_main_is_decode_error() {
        let server = MockServer::start().await;
        let mut body = success_body();
        body.as_object_mut().unwrap().remove("main");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = WeatherClient::with_endpoint(server.uri());
        let err = client.fetch_weather(coordinate(), "key").await.unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn blank_key_never_hits_the_network() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(0)
            .mount(&server)
            .await;

        let client = WeatherClient::with_endpoint(server.uri());
        let err = client.fetch_weather(coordinate(), "   ").await.unwrap_err();

        assert!(matches!(err, FetchError::MissingCredential));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        // Nothing listens on port 1.
        let client = WeatherClient::with_endpoint("http://127.0.0.1:1/weather");
        let err = client.fetch_weather(coordinate(), "key").await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn transport_error_does_not_expose_api_key() {
        let client = WeatherClient::with_endpoint("http://127.0.0.1:1/weather");
        let err = client
            .fetch_weather(coordinate(), "SUPERSECRETKEY")
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(matches!(err, FetchError::Transport(_)));
        assert!(!msg.contains("SUPERSECRETKEY"), "{msg}");
        assert!(!format!("{err:?}").contains("SUPERSECRETKEY"));
    }

    #[tokio::test]
    async fn spawned_fetch_resolves_on_handle() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let client = WeatherClient::with_endpoint(server.uri());
        let result = client
            .spawn_fetch(coordinate(), "key".to_string())
            .await
            .expect("task not cancelled");

        assert!(result.is_ok());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        assert_eq!(truncate_body(&long).chars().count(), 200);
        assert_eq!(truncate_body("short"), "short");
    }
}
